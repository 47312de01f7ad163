//! Pocket Core - Playback and Visualization Engine
//!
//! This crate provides the real-time core of the Pocket player, including:
//! - Decoder and output sink interfaces
//! - The channel waveform synchronizer behind the oscilloscope view
//! - Per-track fade and tone shelf processing
//! - Output delivery with underrun recovery and a position clock
//! - The playback loop and its signal-driven controls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Main Thread                           │
//! │   status line ◀──events── Player      signals ──▶ flags     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel / atomics
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Playback Thread                          │
//! │   Decoder ──▶ Scope sync ──publish──▶ ScopeBuffers (front)  │
//! │      │                                                      │
//! │      └──PCM──▶ Fade ──▶ Tone shelf ──▶ Output ──rtrb──▶ cpal│
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod control;
mod decoder;
mod error;
mod message;
mod output;
mod pipeline;
mod player;
mod scope;
mod settings;
mod stream;
mod track;

pub use config::{
    ControlConfig, FadeMode, OutputConfig, PlayerConfig, StreamFormat, TimingConfig, ToneConfig,
};
#[cfg(unix)]
pub use control::install_signal_handlers;
pub use control::{ControlFlags, InterruptAction, InterruptTracker};
pub use decoder::{
    ChannelScales, Chunk, Decoder, LoadedTrack, TickStatus, TrackLoader, DIRECT_CHANNELS,
    MAX_CHUNK_FRAMES, PSG_CHANNELS, SCOPE_CHANNELS,
};
pub use error::{DecodeError, PlayerError, PlayerResult, SinkError};
pub use message::{Event, FinishReason};
pub use output::{Delivery, OutputDelivery, PcmSink, PositionClock};
pub use pipeline::ChunkPipeline;
pub use player::{Player, PlayerState};
pub use scope::{synchronize, ChannelHistory, ChannelSet, ScopeBuffers, HISTORY_CAPACITY, SCOPE_WIDTH};
pub use stream::CpalSink;
pub use track::{format_clock, TrackTags, TrackTiming};

// Re-export DSP types for convenience
pub use pocket_dsp::{FadeEnvelope, FadeWindow, ShelfParams, ToneShelf};
