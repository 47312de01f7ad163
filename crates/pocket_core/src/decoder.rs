//! Decoder Interface
//!
//! The emulation core is external. The player sees it only through
//! [`Decoder`]: a reported [`StreamFormat`] and one [`Chunk`] per
//! emulation tick. A chunk carries the mixed interleaved PCM for the output
//! device plus the raw per-channel taps used by the scope.

use std::path::Path;

use crate::config::StreamFormat;
use crate::error::DecodeError;
use crate::scope::SCOPE_WIDTH;
use crate::track::TrackTags;

/// Number of PSG (tone/wave/noise) channels
pub const PSG_CHANNELS: usize = 4;

/// Number of direct-sound (PCM FIFO) channels
pub const DIRECT_CHANNELS: usize = 2;

/// Logical channels tracked by the scope: PSG 0-3, direct sound A/B as 4-5
pub const SCOPE_CHANNELS: usize = PSG_CHANNELS + DIRECT_CHANNELS;

/// Largest chunk the pipeline accepts, in frames
///
/// The scope must keep at least one full window after appending a chunk,
/// which holds only while chunks are no wider than the window.
pub const MAX_CHUNK_FRAMES: usize = SCOPE_WIDTH;

/// Per-channel scope scale factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelScales(pub [f32; SCOPE_CHANNELS]);

impl Default for ChannelScales {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl ChannelScales {
    pub fn uniform(scale: f32) -> Self {
        Self([scale; SCOPE_CHANNELS])
    }

    /// Derive scales from the mixer control register (low byte) and PSG
    /// master level.
    ///
    /// - bits 0-1: PSG volume ratio (0 or 3 = 25%, 1 = 50%, 2 = 100%)
    /// - bit 2: direct sound A full volume (else 50%)
    /// - bit 3: direct sound B full volume (else 50%)
    ///
    /// Direct sound is normalized against the PSG level so both families
    /// land on a comparable scope amplitude.
    pub fn from_mix_control(control: u8, psg_level: i32) -> Self {
        let level = psg_level.max(1) as f32;

        let psg = match control & 3 {
            1 => level / 2.0,
            2 => level,
            _ => level / 4.0,
        };

        let direct = |full: bool| {
            let ratio = if full { 1.0 } else { 0.5 };
            ratio / level / 52.0
        };

        Self([
            psg,
            psg,
            psg,
            psg,
            direct(control & 4 != 0),
            direct(control & 8 != 0),
        ])
    }

    #[inline]
    pub fn get(&self, channel: usize) -> f32 {
        self.0[channel]
    }
}

/// One emulation tick worth of samples
///
/// Buffers are reserved for [`MAX_CHUNK_FRAMES`] once and reused for every
/// tick, so a steady-state decoder does not allocate.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Mixed output, interleaved i16
    pub pcm: Vec<i16>,
    /// Raw PSG channel output, one sample per frame
    pub psg: [Vec<i8>; PSG_CHANNELS],
    /// Raw direct-sound output, one sample per frame
    pub direct: [Vec<i16>; DIRECT_CHANNELS],
    /// Scope scale for each logical channel
    pub scales: ChannelScales,
}

impl Chunk {
    /// Empty chunk with capacity for the largest tick of `channels` output channels
    pub fn with_capacity(channels: u16) -> Self {
        Self {
            pcm: Vec::with_capacity(MAX_CHUNK_FRAMES * channels as usize),
            psg: std::array::from_fn(|_| Vec::with_capacity(MAX_CHUNK_FRAMES)),
            direct: std::array::from_fn(|_| Vec::with_capacity(MAX_CHUNK_FRAMES)),
            scales: ChannelScales::default(),
        }
    }

    /// Clear sample data, keeping capacity
    pub fn clear(&mut self) {
        self.pcm.clear();
        for tap in &mut self.psg {
            tap.clear();
        }
        for tap in &mut self.direct {
            tap.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Check the chunk against the stream format, returning its frame count
    pub fn validate(&self, format: &StreamFormat) -> Result<usize, DecodeError> {
        let channels = format.channels as usize;
        if channels == 0 || self.pcm.len() % channels != 0 {
            return Err(DecodeError::MalformedChunk(format!(
                "{} samples is not a whole number of {}-channel frames",
                self.pcm.len(),
                channels
            )));
        }

        let frames = self.pcm.len() / channels;
        if frames > MAX_CHUNK_FRAMES {
            return Err(DecodeError::ChunkTooLarge {
                frames,
                max: MAX_CHUNK_FRAMES,
            });
        }

        let tap_lengths = self
            .psg
            .iter()
            .map(Vec::len)
            .chain(self.direct.iter().map(Vec::len));
        for (channel, len) in tap_lengths.enumerate() {
            if len != frames {
                return Err(DecodeError::MalformedChunk(format!(
                    "channel {} tap has {} samples, expected {}",
                    channel, len, frames
                )));
            }
        }

        Ok(frames)
    }
}

/// Outcome of one emulation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// More ticks follow
    Continue,
    /// The track ended during this tick. Any samples in the chunk are still
    /// delivered.
    EndOfTrack,
}

/// An emulation/decoder core for one loaded track
pub trait Decoder: Send {
    /// Output format, fixed for the life of the track
    fn format(&self) -> StreamFormat;

    /// Run one emulation tick, filling `chunk` (cleared by the caller)
    fn tick(&mut self, chunk: &mut Chunk) -> Result<TickStatus, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn format(&self) -> StreamFormat {
        (**self).format()
    }

    fn tick(&mut self, chunk: &mut Chunk) -> Result<TickStatus, DecodeError> {
        (**self).tick(chunk)
    }
}

/// A loaded track: its decoder plus whatever timing its metadata carried
pub struct LoadedTrack<D> {
    pub decoder: D,
    pub tags: TrackTags,
}

/// Opens tracks from a playlist entry
pub trait TrackLoader {
    type Decoder: Decoder;

    fn load(&mut self, path: &Path) -> Result<LoadedTrack<Self::Decoder>, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_chunk(frames: usize, channels: u16) -> Chunk {
        let mut chunk = Chunk::with_capacity(channels);
        chunk.pcm.resize(frames * channels as usize, 0);
        for tap in &mut chunk.psg {
            tap.resize(frames, 0);
        }
        for tap in &mut chunk.direct {
            tap.resize(frames, 0);
        }
        chunk
    }

    #[test]
    fn test_mix_control_psg_ratio() {
        assert_eq!(ChannelScales::from_mix_control(0, 8).get(0), 2.0);
        assert_eq!(ChannelScales::from_mix_control(1, 8).get(0), 4.0);
        assert_eq!(ChannelScales::from_mix_control(2, 8).get(0), 8.0);
        assert_eq!(ChannelScales::from_mix_control(3, 8).get(3), 2.0);
    }

    #[test]
    fn test_mix_control_direct_sound() {
        let scales = ChannelScales::from_mix_control(0b0100, 4);
        assert_eq!(scales.get(4), 1.0 / 4.0 / 52.0);
        assert_eq!(scales.get(5), 0.5 / 4.0 / 52.0);

        let scales = ChannelScales::from_mix_control(0b1000, 4);
        assert_eq!(scales.get(4), 0.5 / 4.0 / 52.0);
        assert_eq!(scales.get(5), 1.0 / 4.0 / 52.0);
    }

    #[test]
    fn test_mix_control_zero_level_is_finite() {
        let scales = ChannelScales::from_mix_control(0x0c, 0);
        assert!(scales.0.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_chunk_capacity_reused() {
        let mut chunk = filled_chunk(735, 2);
        let capacity = chunk.pcm.capacity();
        chunk.clear();
        assert!(chunk.is_empty());
        assert_eq!(chunk.pcm.capacity(), capacity);
        assert!(chunk.psg[0].capacity() >= MAX_CHUNK_FRAMES);
    }

    #[test]
    fn test_chunk_validate() {
        let format = StreamFormat::new(44100, 2);
        let chunk = filled_chunk(735, 2);
        assert_eq!(chunk.validate(&format).unwrap(), 735);
    }

    #[test]
    fn test_chunk_validate_rejects_oversized() {
        let format = StreamFormat::new(44100, 2);
        let chunk = filled_chunk(MAX_CHUNK_FRAMES + 1, 2);
        assert!(matches!(
            chunk.validate(&format),
            Err(DecodeError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn test_chunk_validate_rejects_mismatched_taps() {
        let format = StreamFormat::new(44100, 2);
        let mut chunk = filled_chunk(100, 2);
        chunk.direct[1].pop();
        assert!(matches!(
            chunk.validate(&format),
            Err(DecodeError::MalformedChunk(_))
        ));

        let mut chunk = filled_chunk(100, 2);
        chunk.pcm.push(0);
        assert!(matches!(
            chunk.validate(&format),
            Err(DecodeError::MalformedChunk(_))
        ));
    }
}
