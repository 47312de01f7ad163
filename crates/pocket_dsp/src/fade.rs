//! End-of-Track Fade Envelope
//!
//! Linear amplitude ramp over the last `fade_ms` of a track. The factor is
//! evaluated once per chunk from the decode position at the start of the
//! chunk and applied to every sample of that chunk.

use crate::processor::{AudioProcessor, ProcessContext};

/// How the distance to the end of the track is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeWindow {
    /// `time_to_end = track_length - position`: fade over the last
    /// `fade_ms` of playback.
    #[default]
    Remaining,

    /// `time_to_end = track_length - fade_ms`, independent of position.
    /// Kept for parity with older player builds: the whole track is either
    /// attenuated by a constant factor or not at all.
    Legacy,
}

/// Fade envelope for one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeEnvelope {
    track_length_ms: f64,
    fade_length_ms: f64,
    window: FadeWindow,
}

impl FadeEnvelope {
    pub fn new(track_length_ms: u32, fade_length_ms: u32) -> Self {
        Self::with_window(track_length_ms, fade_length_ms, FadeWindow::default())
    }

    pub fn with_window(track_length_ms: u32, fade_length_ms: u32, window: FadeWindow) -> Self {
        Self {
            track_length_ms: f64::from(track_length_ms),
            fade_length_ms: f64::from(fade_length_ms),
            window,
        }
    }

    /// An envelope that never attenuates (endless playback)
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn window(&self) -> FadeWindow {
        self.window
    }

    /// Amplitude factor in `[0, 1]` at `position_ms`
    ///
    /// A zero fade length means no fade.
    pub fn factor(&self, position_ms: f64) -> f32 {
        if self.fade_length_ms <= 0.0 {
            return 1.0;
        }

        let time_to_end = match self.window {
            FadeWindow::Remaining => self.track_length_ms - position_ms,
            FadeWindow::Legacy => self.track_length_ms - self.fade_length_ms,
        }
        .max(0.0);

        if time_to_end <= self.fade_length_ms {
            ((time_to_end / self.fade_length_ms) as f32).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Scale every sample by `factor(position_ms)`
    #[inline]
    pub fn apply(&self, buffer: &mut [i16], position_ms: f64) {
        let factor = self.factor(position_ms);
        if factor < 1.0 {
            scale(buffer, factor);
        }
    }
}

/// Scale samples in place, truncating toward zero
#[inline]
pub fn scale(buffer: &mut [i16], factor: f32) {
    for sample in buffer.iter_mut() {
        *sample = (f32::from(*sample) * factor) as i16;
    }
}

impl AudioProcessor for FadeEnvelope {
    fn process(&mut self, buffer: &mut [i16], context: &ProcessContext) {
        self.apply(buffer, context.position_ms);
    }

    fn name(&self) -> &'static str {
        "Fade Envelope"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_bounds() {
        let fade = FadeEnvelope::new(10_000, 2_000);
        let mut position = 0.0;
        while position <= 12_000.0 {
            let f = fade.factor(position);
            assert!((0.0..=1.0).contains(&f), "factor {f} at {position}");
            position += 16.6;
        }
    }

    #[test]
    fn test_factor_zero_at_track_end() {
        let fade = FadeEnvelope::new(10_000, 2_000);
        assert_eq!(fade.factor(10_000.0), 0.0);
        assert_eq!(fade.factor(10_500.0), 0.0);
    }

    #[test]
    fn test_factor_one_before_window() {
        let fade = FadeEnvelope::new(10_000, 2_000);
        assert_eq!(fade.factor(0.0), 1.0);
        assert_eq!(fade.factor(7_999.0), 1.0);
        assert_eq!(fade.factor(8_000.0), 1.0);
        assert!(fade.factor(8_001.0) < 1.0);
    }

    #[test]
    fn test_halfway_through_fade() {
        let fade = FadeEnvelope::new(10_000, 2_000);
        assert_eq!(fade.factor(9_000.0), 0.5);

        let input: Vec<i16> = vec![1000, -1000, 3, -3, 32767, -32768, 0, 1];
        let mut buffer = input.clone();
        fade.apply(&mut buffer, 9_000.0);

        let expected: Vec<i16> = input.iter().map(|&s| (s as f32 * 0.5) as i16).collect();
        assert_eq!(buffer, expected);
        // Truncation toward zero, not rounding
        assert_eq!(buffer[2], 1);
        assert_eq!(buffer[3], -1);
        assert_eq!(buffer[7], 0);
    }

    #[test]
    fn test_zero_fade_length_is_no_fade() {
        let fade = FadeEnvelope::new(10_000, 0);
        assert_eq!(fade.factor(10_000.0), 1.0);
        assert_eq!(fade.factor(20_000.0), 1.0);

        let mut buffer = vec![1234_i16; 8];
        fade.apply(&mut buffer, 10_000.0);
        assert!(buffer.iter().all(|&s| s == 1234));
    }

    #[test]
    fn test_fade_longer_than_track_covers_whole_track() {
        let fade = FadeEnvelope::new(1_000, 4_000);
        assert!(fade.factor(0.0) < 1.0);
        assert_eq!(fade.factor(0.0), 0.25);
        assert_eq!(fade.factor(1_000.0), 0.0);
    }

    #[test]
    fn test_legacy_window_ignores_position() {
        // 10s track, 2s fade: 8s to end > 2s fade, never attenuates
        let fade = FadeEnvelope::with_window(10_000, 2_000, FadeWindow::Legacy);
        assert_eq!(fade.factor(0.0), 1.0);
        assert_eq!(fade.factor(9_999.0), 1.0);

        // 3s track (1s + 2s fade): constant 0.5 for the whole track
        let fade = FadeEnvelope::with_window(3_000, 2_000, FadeWindow::Legacy);
        assert_eq!(fade.factor(0.0), 0.5);
        assert_eq!(fade.factor(2_900.0), 0.5);
    }

    #[test]
    fn test_disabled_envelope() {
        let fade = FadeEnvelope::disabled();
        assert_eq!(fade.factor(1e9), 1.0);
    }

    #[test]
    fn test_as_processor_uses_context_position() {
        let mut fade = FadeEnvelope::new(10_000, 2_000);
        let mut buffer = vec![100_i16; 4];
        let ctx = ProcessContext::new(44100.0, 2, 9_000.0);
        fade.process(&mut buffer, &ctx);
        assert_eq!(buffer, vec![50; 4]);
    }
}
