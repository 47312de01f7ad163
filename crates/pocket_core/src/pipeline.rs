//! Per-Track Sample Pipeline
//!
//! Fade then tone shelf, applied to a scratch copy of each chunk's PCM so
//! the decoder's buffer (and with it the scope taps) stays untouched.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::debug;

use pocket_dsp::{FadeEnvelope, ProcessorChain, ShelfParams, ToneShelf};

use crate::config::{StreamFormat, ToneConfig};
use crate::decoder::MAX_CHUNK_FRAMES;
use crate::error::PlayerResult;

/// Processing state for one track
///
/// Filter memory and fade timing live here and are dropped with the track.
pub struct ChunkPipeline {
    chain: ProcessorChain,
    scratch: Vec<i16>,
}

impl ChunkPipeline {
    /// Build the chain for `format`
    ///
    /// The shelf works on interleaved stereo pairs, so mono streams get the
    /// fade only.
    pub fn new(
        format: StreamFormat,
        envelope: FadeEnvelope,
        tone: &ToneConfig,
        tone_flag: Arc<AtomicBool>,
    ) -> PlayerResult<Self> {
        let sample_rate = format.sample_rate as f32;
        let mut chain = ProcessorChain::new(sample_rate, format.channels as usize);
        chain.add(envelope);

        if format.channels == 2 {
            let params = ShelfParams {
                sample_rate,
                corner_hz: tone.corner_hz,
                gain_db: tone.gain_db,
                slope: tone.slope,
            };
            chain.add(ToneShelf::with_params(params)?.with_toggle(tone_flag));
        } else {
            debug!("{}-channel stream: tone shelf not applied", format.channels);
        }

        Ok(Self {
            chain,
            scratch: Vec::with_capacity(MAX_CHUNK_FRAMES * format.channels as usize),
        })
    }

    /// Process one chunk of PCM at `position_ms`, returning the result
    pub fn process(&mut self, pcm: &[i16], position_ms: f64) -> PlayerResult<&[i16]> {
        self.scratch.clear();
        self.scratch.extend_from_slice(pcm);
        self.chain.process(&mut self.scratch, position_ms)?;
        Ok(&self.scratch)
    }

    /// Names of the active stages, in order
    pub fn stages(&self) -> Vec<&'static str> {
        self.chain.names()
    }
}
