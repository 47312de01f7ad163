//! Tone Shelf ("bass boost")
//!
//! A single low-shelf BiQuad applied to the interleaved stereo output.
//! Coefficients follow the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook
//! low-shelf using the shelf-slope form of `alpha`, which the `biquad`
//! crate's `Type::LowShelf` does not expose, so they are computed here and
//! handed to a `DirectForm1` per side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm1};
use tracing::debug;

use crate::error::DspError;
use crate::processor::{AudioProcessor, ProcessContext};

/// Default shelf corner frequency (Hz)
pub const DEFAULT_CORNER_HZ: f32 = 250.0;

/// Default shelf gain (dB)
pub const DEFAULT_GAIN_DB: f32 = 5.0;

/// Shelf slope `S`. 0.707 gives the steepest slope without overshoot.
pub const DEFAULT_SLOPE: f32 = 0.707;

/// Parameters the shelf coefficients are derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShelfParams {
    pub sample_rate: f32,
    pub corner_hz: f32,
    pub gain_db: f32,
    pub slope: f32,
}

impl ShelfParams {
    pub fn new(sample_rate: f32, corner_hz: f32, gain_db: f32) -> Self {
        Self {
            sample_rate,
            corner_hz,
            gain_db,
            slope: DEFAULT_SLOPE,
        }
    }

    /// Compute normalized low-shelf coefficients
    ///
    /// ```text
    /// A     = 10^(gain/40)
    /// w0    = 2*pi*f0/fs
    /// alpha = sin(w0)/2 * sqrt((A + 1/A)*(1/S - 1) + 2)
    /// k     = cos(w0)
    /// ```
    pub fn to_coefficients(self) -> Result<Coefficients<f32>, DspError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(self.sample_rate));
        }
        let nyquist = self.sample_rate / 2.0;
        if !(self.corner_hz > 0.0 && self.corner_hz < nyquist && self.slope > 0.0) {
            return Err(DspError::InvalidCoefficients {
                frequency: self.corner_hz,
                sample_rate: self.sample_rate,
            });
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * self.corner_hz / self.sample_rate;
        let alpha = w0.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / self.slope - 1.0) + 2.0).sqrt();
        let k = w0.cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * k + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * k);
        let b2 = a * ((a + 1.0) - (a - 1.0) * k - two_sqrt_a_alpha);
        let a0 = (a + 1.0) + (a - 1.0) * k + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * k);
        let a2 = (a + 1.0) + (a - 1.0) * k - two_sqrt_a_alpha;

        let coeffs = Coefficients {
            a1: a1 / a0,
            a2: a2 / a0,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
        };

        let all_finite = [coeffs.a1, coeffs.a2, coeffs.b0, coeffs.b1, coeffs.b2]
            .iter()
            .all(|c| c.is_finite());
        if !all_finite {
            return Err(DspError::InvalidCoefficients {
                frequency: self.corner_hz,
                sample_rate: self.sample_rate,
            });
        }

        Ok(coeffs)
    }
}

/// Runtime-toggleable low-shelf filter for interleaved stereo i16 PCM
///
/// Filter memory lives in the two `DirectForm1` instances and survives
/// toggling: a disabled shelf is simply not run.
///
/// The enabled flag is an `Arc<AtomicBool>` so it can be flipped from
/// outside the chain (signal handler, control thread) while the shelf
/// itself is owned by the playback thread.
pub struct ToneShelf {
    left: DirectForm1<f32>,
    right: DirectForm1<f32>,
    coeffs: Coefficients<f32>,
    params: ShelfParams,
    enabled: Arc<AtomicBool>,
}

impl ToneShelf {
    /// Create a shelf with the default slope
    pub fn new(sample_rate: f32, corner_hz: f32, gain_db: f32) -> Result<Self, DspError> {
        Self::with_params(ShelfParams::new(sample_rate, corner_hz, gain_db))
    }

    pub fn with_params(params: ShelfParams) -> Result<Self, DspError> {
        let coeffs = params.to_coefficients()?;
        debug!(
            sample_rate = params.sample_rate,
            corner_hz = params.corner_hz,
            gain_db = params.gain_db,
            "tone shelf configured"
        );
        Ok(Self {
            left: DirectForm1::<f32>::new(coeffs),
            right: DirectForm1::<f32>::new(coeffs),
            coeffs,
            params,
            enabled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned enable flag
    pub fn with_toggle(mut self, enabled: Arc<AtomicBool>) -> Self {
        self.enabled = enabled;
        self
    }

    /// Handle to the enable flag
    pub fn toggle_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    /// Recompute coefficients. Filter memory is kept.
    pub fn configure(&mut self, params: ShelfParams) -> Result<(), DspError> {
        let coeffs = params.to_coefficients()?;
        self.left.update_coefficients(coeffs);
        self.right.update_coefficients(coeffs);
        self.coeffs = coeffs;
        self.params = params;
        Ok(())
    }

    pub fn coefficients(&self) -> Coefficients<f32> {
        self.coeffs
    }

    pub fn params(&self) -> ShelfParams {
        self.params
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Filter one stereo pair, returning the clipped output
    #[inline]
    pub fn process_pair(&mut self, left: i16, right: i16) -> (i16, i16) {
        let out_l = self.left.run(f32::from(left));
        let out_r = self.right.run(f32::from(right));
        (clip_to_i16(out_l), clip_to_i16(out_r))
    }

    /// Filter an interleaved stereo buffer in place
    ///
    /// Expects whole frames; `ProcessorChain` rejects anything else.
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [i16]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_pair(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }
}

/// Hard clip to the 16-bit range, then truncate toward zero
#[inline]
fn clip_to_i16(sample: f32) -> i16 {
    sample.clamp(-32768.0, 32767.0) as i16
}

impl AudioProcessor for ToneShelf {
    fn process(&mut self, buffer: &mut [i16], _context: &ProcessContext) {
        self.process_interleaved(buffer);
    }

    fn name(&self) -> &'static str {
        "Tone Shelf"
    }

    fn is_enabled(&self) -> bool {
        ToneShelf::is_enabled(self)
    }
}
