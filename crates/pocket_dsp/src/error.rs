//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while configuring or running DSP stages
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid shelf parameters: corner {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Interleaved buffer of {len} samples is not a multiple of {channels} channels")]
    InterleaveMismatch { len: usize, channels: usize },
}
