//! One-pole exponential smoother for scope traces
//!
//! `y[n] = a * x[n] + (1 - a) * y[n-1]`
//!
//! The memory is owned by the caller (the scope keeps one memory cell per
//! history position) so smoothing continues across frame boundaries.

/// Smoothing factor applied to scope samples
pub const SCOPE_SMOOTHING: f32 = 0.1;

/// Advance the smoother by one sample
#[inline]
pub fn smooth_step(previous: f32, input: f32, smoothing: f32) -> f32 {
    smoothing * input + (1.0 - smoothing) * previous
}

/// Smooth `input` into `output`, seeded from `previous`
///
/// Returns the last output value (the new memory). `output` must be at
/// least as long as `input`.
#[inline]
pub fn smooth_into(previous: f32, input: impl IntoIterator<Item = f32>, output: &mut [f32]) -> f32 {
    let mut memory = previous;
    for (slot, x) in output.iter_mut().zip(input) {
        memory = smooth_step(memory, x, SCOPE_SMOOTHING);
        *slot = memory;
    }
    memory
}
