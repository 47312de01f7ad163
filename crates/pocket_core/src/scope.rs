//! Channel Waveform Synchronizer
//!
//! Keeps a scrolling, per-channel sample history for the oscilloscope view
//! and aligns each new frame on a rising crossing of the previous frame's
//! midline, so a periodic waveform stands still on screen instead of
//! drifting or jumping.
//!
//! # Double buffering
//!
//! ```text
//!            front (published)              back (being written)
//!   ┌──────────────────────────────┐   ┌──────────────────────────────┐
//!   │ ch0 ch1 ch2 ch3 dsA dsB      │──▶│ tail from anchor + new chunk │
//!   └──────────────────────────────┘   └──────────────────────────────┘
//!                 ▲                                   │
//!       readers (under toggle lock)       publish(): swap under lock
//! ```
//!
//! The playback thread reads the front set and writes only the back set,
//! then flips the front index once per chunk. Readers hold the toggle lock
//! for as long as they look at the front set, so they never observe a
//! half-written frame.

use parking_lot::{Mutex, RwLock};

use pocket_dsp::smooth_into;

use crate::decoder::{Chunk, PSG_CHANNELS, SCOPE_CHANNELS};

/// Visible window width in samples
pub const SCOPE_WIDTH: usize = 800;

/// History capacity per channel
pub const HISTORY_CAPACITY: usize = 2 * SCOPE_WIDTH;

/// Sample history of one logical channel in one buffer set
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    /// Display samples (smoothed, truncated)
    samples: Vec<i32>,
    /// Smoother memory, one cell per history position
    memory: Vec<f32>,
    /// End of valid history
    last: usize,
    /// Length of the tail carried over from the previous frame
    watermark: usize,
}

impl ChannelHistory {
    /// Starts full of silence
    fn new() -> Self {
        Self {
            samples: vec![0; HISTORY_CAPACITY],
            memory: vec![0.0; HISTORY_CAPACITY],
            last: HISTORY_CAPACITY,
            watermark: 0,
        }
    }

    /// The visible window: the first `SCOPE_WIDTH` samples
    pub fn window(&self) -> &[i32] {
        &self.samples[..SCOPE_WIDTH]
    }

    /// All valid history
    pub fn history(&self) -> &[i32] {
        &self.samples[..self.last]
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Midline of the visible window
    fn threshold(&self) -> i32 {
        let window = self.window();
        let min = window.iter().copied().min().unwrap_or(0);
        let max = window.iter().copied().max().unwrap_or(0);
        (min + max) / 2
    }

    /// Where the next frame's tail should start when `frames` new samples follow
    fn anchor(&self, frames: usize) -> usize {
        let min_need = SCOPE_WIDTH - frames;
        let search_head = self.last - min_need;
        let th = self.threshold();

        // Most recent rising crossing at or before the search head
        let start = search_head.min(self.last - 1);
        let crossing = (1..=start)
            .rev()
            .find(|&i| self.samples[i - 1] < th && self.samples[i] >= th);

        match crossing {
            Some(i) if i >= self.watermark && self.last - i + frames <= HISTORY_CAPACITY => i,
            _ => search_head,
        }
    }
}

/// The six channel histories of one buffer set
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: [ChannelHistory; SCOPE_CHANNELS],
}

impl ChannelSet {
    fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| ChannelHistory::new()),
        }
    }

    pub fn channel(&self, channel: usize) -> &ChannelHistory {
        &self.channels[channel]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelHistory> {
        self.channels.iter()
    }
}

/// Build the back history of one channel from the front history and a new chunk
///
/// Only `back` is written. Chunks wider than the window keep their last
/// `SCOPE_WIDTH` samples.
pub fn synchronize<T>(front: &ChannelHistory, back: &mut ChannelHistory, scale: f32, raw: &[T])
where
    T: Copy + Into<f32>,
{
    let raw = &raw[raw.len().saturating_sub(SCOPE_WIDTH)..];
    let frames = raw.len();

    let anchor = front.anchor(frames);
    let kept = front.last - anchor;

    back.samples[..kept].copy_from_slice(&front.samples[anchor..front.last]);
    back.memory[..kept].copy_from_slice(&front.memory[anchor..front.last]);
    back.watermark = kept;

    let previous = if kept > 0 {
        back.memory[kept - 1]
    } else {
        front.memory[front.last - 1]
    };

    let end = kept + frames;
    smooth_into(
        previous,
        raw.iter().map(|&x| x.into() * scale),
        &mut back.memory[kept..end],
    );
    for (sample, &smoothed) in back.samples[kept..end].iter_mut().zip(&back.memory[kept..end]) {
        *sample = smoothed as i32;
    }

    back.last = end;
    debug_assert!(back.last >= SCOPE_WIDTH, "scope window shrank to {}", back.last);
}

/// Double-buffered scope state shared between the playback thread and a viewer
pub struct ScopeBuffers {
    sets: [RwLock<ChannelSet>; 2],
    front: Mutex<usize>,
}

impl Default for ScopeBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeBuffers {
    /// Allocates all history once; it is reused for every track
    pub fn new() -> Self {
        Self {
            sets: [RwLock::new(ChannelSet::new()), RwLock::new(ChannelSet::new())],
            front: Mutex::new(0),
        }
    }

    /// Index of the published set (0 or 1)
    pub fn front_index(&self) -> usize {
        *self.front.lock()
    }

    /// Update a single channel of the back set
    pub fn update_channel<T>(&self, channel: usize, scale: f32, raw: &[T])
    where
        T: Copy + Into<f32>,
    {
        self.with_sets(|front, back| {
            synchronize(&front.channels[channel], &mut back.channels[channel], scale, raw);
        });
    }

    /// Update all six channels of the back set from one chunk
    ///
    /// Does not publish; call [`publish`](Self::publish) afterwards.
    pub fn update_chunk(&self, chunk: &Chunk) {
        self.with_sets(|front, back| {
            for (ch, tap) in chunk.psg.iter().enumerate() {
                synchronize(
                    &front.channels[ch],
                    &mut back.channels[ch],
                    chunk.scales.get(ch),
                    tap,
                );
            }
            for (i, tap) in chunk.direct.iter().enumerate() {
                let ch = PSG_CHANNELS + i;
                synchronize(
                    &front.channels[ch],
                    &mut back.channels[ch],
                    chunk.scales.get(ch),
                    tap,
                );
            }
        });
    }

    /// Make the back set the front set
    pub fn publish(&self) {
        let mut front = self.front.lock();
        *front ^= 1;
    }

    /// Read the published set while holding the toggle lock
    ///
    /// Keep `f` short: the playback thread waits on this lock to publish.
    pub fn read<R>(&self, f: impl FnOnce(&ChannelSet) -> R) -> R {
        let front = self.front.lock();
        let set = self.sets[*front].read();
        f(&set)
    }

    /// Copy of one channel's visible window
    pub fn window(&self, channel: usize) -> Vec<i32> {
        self.read(|set| set.channel(channel).window().to_vec())
    }

    fn with_sets(&self, f: impl FnOnce(&ChannelSet, &mut ChannelSet)) {
        // Only the playback thread publishes, so the index is stable here
        let front = self.front_index();
        let front_set = self.sets[front].read();
        let mut back_set = self.sets[front ^ 1].write();
        f(&front_set, &mut back_set);
    }
}
