//! Player Error Types

use thiserror::Error;

/// Errors that can stop the player
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("No output device found")]
    NoDevicesFound,

    #[error("Output device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open output device: {0}")]
    DeviceOpenError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to spawn playback thread: {0}")]
    ThreadSpawn(String),

    #[error("DSP error: {0}")]
    DspError(#[from] pocket_dsp::DspError),

    #[error("Decoder error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Result type alias for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Errors reported by a decoder (emulation core adapter)
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to load track {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Emulation tick failed: {0}")]
    Tick(String),

    #[error("Chunk of {frames} frames exceeds maximum of {max}")]
    ChunkTooLarge { frames: usize, max: usize },

    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("Unsupported stream format: {sample_rate}Hz, {channels} channels")]
    UnsupportedFormat { sample_rate: u32, channels: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by an output sink
///
/// These never leave the delivery stage: every one is answered with
/// `PcmSink::recover` and playback continues with the next chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Output underrun")]
    Underrun,

    #[error("Output device error: {0}")]
    Device(String),
}
