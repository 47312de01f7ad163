//! Stream and Player Configuration

use serde::{Deserialize, Serialize};

use pocket_dsp::{FadeWindow, DEFAULT_CORNER_HZ, DEFAULT_GAIN_DB, DEFAULT_SLOPE};

/// Format reported by the decoder for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz (e.g., 32768, 44100, 48000)
    pub sample_rate: u32,

    /// Number of interleaved output channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes per interleaved frame (i16 samples * channels)
    pub fn bytes_per_frame(&self) -> usize {
        2 * self.channels as usize
    }

    /// Frames contained in `bytes` of interleaved PCM
    pub fn frames_in(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    /// Duration of `frames` in milliseconds
    pub fn frames_to_ms(&self, frames: usize) -> f64 {
        frames as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// Validate format
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        Ok(())
    }
}

/// Output device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,

    /// Device-side buffer in frames. Larger = more latency, fewer underruns.
    pub buffer_frames: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: 4096,
        }
    }
}

/// Tone shelf ("bass boost") configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub corner_hz: f32,
    pub gain_db: f32,
    pub slope: f32,
    /// Initial state of the toggle at process start
    pub enabled_at_start: bool,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            corner_hz: DEFAULT_CORNER_HZ,
            gain_db: DEFAULT_GAIN_DB,
            slope: DEFAULT_SLOPE,
            enabled_at_start: false,
        }
    }
}

/// Which fade window arithmetic to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeMode {
    /// Fade over the last `fade_ms` of playback
    #[default]
    Remaining,
    /// Position-independent window of older builds
    Legacy,
}

impl From<FadeMode> for FadeWindow {
    fn from(mode: FadeMode) -> Self {
        match mode {
            FadeMode::Remaining => FadeWindow::Remaining,
            FadeMode::Legacy => FadeWindow::Legacy,
        }
    }
}

/// Defaults used when a track's metadata has no timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Length used when the track has none (or it is ignored)
    pub default_length_ms: u32,

    /// Fade used when the track has none
    pub default_fade_ms: u32,

    /// Always use `default_length_ms`
    pub ignore_track_length: bool,

    /// Never end a track on time and never fade
    pub endless: bool,

    pub fade_mode: FadeMode,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_length_ms: 150_000,
            default_fade_ms: 10_000,
            ignore_track_length: false,
            endless: false,
            fade_mode: FadeMode::Remaining,
        }
    }
}

/// Interrupt handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Two interrupts closer than this quit the player
    pub double_interrupt_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            double_interrupt_ms: 1500,
        }
    }
}

/// Overall player configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub output: OutputConfig,
    pub tone: ToneConfig,
    pub timing: TimingConfig,
    pub controls: ControlConfig,
}

impl PlayerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.output.buffer_frames < 256 || self.output.buffer_frames > 65536 {
            return Err(format!("Invalid buffer size: {}", self.output.buffer_frames));
        }
        if !(self.tone.corner_hz > 0.0 && self.tone.corner_hz.is_finite()) {
            return Err(format!("Invalid tone corner: {}", self.tone.corner_hz));
        }
        if !self.tone.gain_db.is_finite() || self.tone.gain_db.abs() > 24.0 {
            return Err(format!("Invalid tone gain: {}", self.tone.gain_db));
        }
        if !(self.tone.slope > 0.0 && self.tone.slope <= 1.0) {
            return Err(format!("Invalid tone slope: {}", self.tone.slope));
        }
        if self.timing.default_length_ms == 0 {
            return Err("Default track length must be positive".to_string());
        }
        if self.controls.double_interrupt_ms == 0 {
            return Err("Double interrupt window must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.output.buffer_frames, 4096);
        assert_eq!(config.tone.corner_hz, 250.0);
        assert_eq!(config.tone.gain_db, 5.0);
        assert!(!config.tone.enabled_at_start);
        assert_eq!(config.timing.default_length_ms, 150_000);
        assert_eq!(config.timing.default_fade_ms, 10_000);
        assert_eq!(config.controls.double_interrupt_ms, 1500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_math() {
        let stereo = StreamFormat::new(44100, 2);
        assert_eq!(stereo.bytes_per_frame(), 4);
        assert_eq!(stereo.frames_in(2940), 735);
        assert!((stereo.frames_to_ms(735) - 16.666_666).abs() < 1e-3);

        let mono = StreamFormat::new(8000, 1);
        assert_eq!(mono.frames_in(1600), 800);
        assert_eq!(mono.frames_to_ms(800), 100.0);
    }

    #[test]
    fn test_format_validation() {
        assert!(StreamFormat::default().validate().is_ok());
        assert!(StreamFormat::new(100, 2).validate().is_err());
        assert!(StreamFormat::new(44100, 0).validate().is_err());
        assert!(StreamFormat::new(44100, 6).validate().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = PlayerConfig::default();
        config.output.buffer_frames = 10;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.tone.slope = 0.0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.tone.gain_db = 60.0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.controls.double_interrupt_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fade_mode_mapping() {
        assert_eq!(FadeWindow::from(FadeMode::Remaining), FadeWindow::Remaining);
        assert_eq!(FadeWindow::from(FadeMode::Legacy), FadeWindow::Legacy);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = PlayerConfig::default();
        config.timing.fade_mode = FadeMode::Legacy;
        config.output.device = Some("USB Audio".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"legacy\""));
        let deserialized: PlayerConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.timing.fade_mode, FadeMode::Legacy);
        assert_eq!(deserialized.output.device.as_deref(), Some("USB Audio"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "tone": { "gain_db": 3.0 }, "timing": { "endless": true } }"#;
        let config: PlayerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.tone.gain_db, 3.0);
        assert_eq!(config.tone.corner_hz, 250.0);
        assert!(config.timing.endless);
        assert_eq!(config.timing.default_fade_ms, 10_000);
        assert_eq!(config.output.buffer_frames, 4096);
    }
}
