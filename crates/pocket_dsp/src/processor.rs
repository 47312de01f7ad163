//! Audio Processor Trait
//!
//! Defines the interface for the chainable stages that shape a chunk of
//! interleaved 16-bit PCM before it is handed to the output device
//! (fade envelope -> tone shelf).

use crate::error::DspError;

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    /// Decode position at the start of the chunk, in milliseconds
    pub position_ms: f64,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, position_ms: f64) -> Self {
        Self {
            sample_rate,
            channels,
            position_ms,
        }
    }

    /// Same stream, different position
    pub fn at(self, position_ms: f64) -> Self {
        Self {
            position_ms,
            ..self
        }
    }
}

/// Trait for stages in the delivery chain
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations
/// - NO syscalls or locks
/// - O(n) time where n = buffer length
pub trait AudioProcessor: Send {
    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved: [L0, R0, L1, R1, ...]
    fn process(&mut self, buffer: &mut [i16], context: &ProcessContext);

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Whether this processor is currently enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A chain of processors applied sequentially
///
/// Disabled processors are skipped entirely, so their state is left exactly
/// as it was when they were last run.
pub struct ProcessorChain {
    processors: Vec<Box<dyn AudioProcessor>>,
    context: ProcessContext,
}

impl ProcessorChain {
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            processors: Vec::new(),
            context: ProcessContext::new(sample_rate, channels, 0.0),
        }
    }

    /// Add a processor to the end of the chain
    ///
    /// Note: This allocates. Only call during track setup.
    pub fn add<P: AudioProcessor + 'static>(&mut self, processor: P) {
        self.processors.push(Box::new(processor));
    }

    /// Process buffer through all enabled processors at `position_ms`
    ///
    /// The buffer must hold whole frames; otherwise nothing is touched.
    #[inline]
    pub fn process(&mut self, buffer: &mut [i16], position_ms: f64) -> Result<(), DspError> {
        let channels = self.context.channels.max(1);
        if buffer.len() % channels != 0 {
            return Err(DspError::InterleaveMismatch {
                len: buffer.len(),
                channels,
            });
        }

        let context = self.context.at(position_ms);
        for processor in &mut self.processors {
            if processor.is_enabled() {
                processor.process(buffer, &context);
            }
        }
        Ok(())
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    /// Names of the processors, in processing order
    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
