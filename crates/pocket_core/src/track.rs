//! Track Timing
//!
//! Length and fade come from the track's metadata (parsed elsewhere) and
//! are resolved against the configured defaults once, before playback.

use serde::{Deserialize, Serialize};

use pocket_dsp::FadeEnvelope;

use crate::config::TimingConfig;

/// Timing-related metadata of a track, as parsed from its tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTags {
    pub title: Option<String>,
    /// Playing length before the fade starts
    pub length_ms: Option<u32>,
    pub fade_ms: Option<u32>,
}

/// Resolved timing for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTiming {
    /// Total length including the fade
    pub length_ms: u32,
    pub fade_ms: u32,
    /// No time-based end and no fade
    pub endless: bool,
}

impl TrackTiming {
    pub fn new(length_ms: u32, fade_ms: u32) -> Self {
        Self {
            length_ms,
            fade_ms,
            endless: false,
        }
    }

    /// Resolve tags against defaults
    ///
    /// The tagged length excludes the fade, so the fade is added on top.
    pub fn resolve(tags: &TrackTags, defaults: &TimingConfig) -> Self {
        let fade_ms = tags.fade_ms.unwrap_or(defaults.default_fade_ms);
        let length_ms = match tags.length_ms {
            Some(length) if !defaults.ignore_track_length => length.saturating_add(fade_ms),
            _ => defaults.default_length_ms,
        };

        Self {
            length_ms,
            fade_ms,
            endless: defaults.endless,
        }
    }

    /// Fade envelope for this track
    pub fn envelope(&self, defaults: &TimingConfig) -> FadeEnvelope {
        if self.endless {
            FadeEnvelope::disabled()
        } else {
            FadeEnvelope::with_window(self.length_ms, self.fade_ms, defaults.fade_mode.into())
        }
    }

    /// Whether playback at `position_ms` has run past the end
    pub fn is_finished(&self, position_ms: f64) -> bool {
        !self.endless && position_ms >= f64::from(self.length_ms)
    }

    /// Time left at `position_ms`, clamped at zero
    pub fn remaining_ms(&self, position_ms: f64) -> u32 {
        (f64::from(self.length_ms) - position_ms).max(0.0) as u32
    }
}

/// Format milliseconds as `mm:ss.cc`
pub fn format_clock(ms: f64) -> String {
    let ms = ms.max(0.0) as u64;
    format!("{:02}:{:02}.{:02}", ms / 60_000, (ms / 1000) % 60, (ms / 10) % 100)
}
