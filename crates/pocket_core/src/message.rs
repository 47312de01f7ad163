//! Message Types for Thread Communication
//!
//! Events flow from the playback thread to whoever displays status
//! (the CLI status line, a scope viewer). Control goes the other way
//! through [`ControlFlags`](crate::control::ControlFlags), not messages.

use serde::{Deserialize, Serialize};

/// Why a track stopped playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// The decoder reported end of track
    EndOfTrack,
    /// Position reached the track length
    TimeElapsed,
    /// An interrupt stopped it
    Interrupted,
    /// The decoder failed mid-track
    DecoderError,
}

/// Events sent from the playback thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// A track loaded and its output opened
    TrackStarted {
        path: String,
        title: Option<String>,
        sample_rate: u32,
        channels: u16,
        length_ms: u32,
        fade_ms: u32,
        endless: bool,
    },

    /// A playlist entry could not be played
    TrackSkipped { path: String, reason: String },

    /// Sent after every delivered chunk
    Progress { position_ms: f64, length_ms: u32 },

    /// Tone shelf switched on or off
    ToneToggled { enabled: bool },

    /// Output error answered with a recovery (audio glitch)
    UnderrunRecovered { count: u64 },

    TrackFinished { path: String, reason: FinishReason },

    /// Error occurred
    Error { message: String },

    /// The player is shutting down
    Exiting,
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::Progress {
            position_ms: 1234.5,
            length_ms: 150_000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Progress"));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("Test error message");
        if let Event::Error { message } = event {
            assert_eq!(message, "Test error message");
        } else {
            panic!("Should be Error variant");
        }
    }

    #[test]
    fn test_track_finished_serialization() {
        let event = Event::TrackFinished {
            path: "song.raw".to_string(),
            reason: FinishReason::Interrupted,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Interrupted"));
        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_unit_variant_tagging() {
        let json = serde_json::to_string(&Event::Exiting).unwrap();
        assert_eq!(json, r#"{"type":"Exiting"}"#);
    }
}
