//! Pocket DSP - Sample Processing Stages
//!
//! This crate provides the per-chunk processing used by the player's
//! delivery path and scope:
//! - Low-shelf "tone" filter (RBJ cookbook BiQuad, Direct Form I)
//! - End-of-track linear fade envelope
//! - One-pole exponential smoother for scope traces
//!
//! # Architecture
//!
//! All stages operate in place on interleaved signed 16-bit PCM and follow
//! a strict "no allocation while processing" rule. Per-track state (filter
//! memory, fade timing) is created at track start and dropped at track end.

mod error;
mod fade;
mod processor;
mod shelf;
mod smoothing;

pub use error::DspError;
pub use fade::{scale, FadeEnvelope, FadeWindow};
pub use processor::{AudioProcessor, ProcessContext, ProcessorChain};
pub use shelf::{ShelfParams, ToneShelf, DEFAULT_CORNER_HZ, DEFAULT_GAIN_DB, DEFAULT_SLOPE};
pub use smoothing::{smooth_into, smooth_step, SCOPE_SMOOTHING};
