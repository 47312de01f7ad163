//! Signal-Driven Control
//!
//! Asynchronous requests (interrupt, tone toggle) land in [`ControlFlags`]
//! as plain atomic operations. The playback loop polls the flags once per
//! chunk and decides what an interrupt means with [`InterruptTracker`], so
//! no timing or I/O ever happens in signal context.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Flags shared between signal handlers (or any other thread) and the loop
#[derive(Debug, Default)]
pub struct ControlFlags {
    /// Interrupts received since the loop last looked
    interrupts: AtomicU32,
    /// Tone shelf toggle, shared with the shelf itself
    tone: Arc<AtomicBool>,
}

impl ControlFlags {
    pub fn new(tone_enabled: bool) -> Self {
        Self {
            interrupts: AtomicU32::new(0),
            tone: Arc::new(AtomicBool::new(tone_enabled)),
        }
    }

    /// Record one interrupt. Async-signal-safe.
    #[inline]
    pub fn request_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
    }

    /// Take all pending interrupts
    pub fn take_interrupts(&self) -> u32 {
        self.interrupts.swap(0, Ordering::SeqCst)
    }

    /// Flip the tone toggle, returning the new state. Async-signal-safe.
    #[inline]
    pub fn toggle_tone(&self) -> bool {
        !self.tone.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn tone_enabled(&self) -> bool {
        self.tone.load(Ordering::Relaxed)
    }

    /// Handle for the tone shelf's enable flag
    pub fn tone_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.tone)
    }
}

/// What an observed interrupt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop the current track and move on
    StopTrack,
    /// Second interrupt inside the window: quit
    Exit,
}

/// Decides between "next track" and "quit" from interrupt timing
#[derive(Debug, Clone)]
pub struct InterruptTracker {
    last: Option<Instant>,
    window: Duration,
}

impl InterruptTracker {
    pub fn new(window: Duration) -> Self {
        Self { last: None, window }
    }

    /// Record an interrupt observed at `now`
    pub fn observe(&mut self, now: Instant) -> InterruptAction {
        let action = match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => InterruptAction::Exit,
            _ => InterruptAction::StopTrack,
        };
        self.last = Some(now);
        action
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::sync::{Arc, OnceLock};

    use tracing::debug;

    use super::ControlFlags;

    static FLAGS: OnceLock<Arc<ControlFlags>> = OnceLock::new();

    extern "C" fn on_signal(signal: libc::c_int) {
        // Atomics only
        if let Some(flags) = FLAGS.get() {
            match signal {
                libc::SIGINT => flags.request_interrupt(),
                libc::SIGUSR2 => {
                    flags.toggle_tone();
                }
                _ => {}
            }
        }
    }

    /// Route SIGINT to interrupts and SIGUSR2 to the tone toggle
    ///
    /// Handlers are process-wide; only the first set of flags is used.
    pub fn install_signal_handlers(flags: Arc<ControlFlags>) -> io::Result<()> {
        install_handlers(flags, &[libc::SIGINT, libc::SIGUSR2])
    }

    pub(super) fn install_handlers(
        flags: Arc<ControlFlags>,
        signals: &[libc::c_int],
    ) -> io::Result<()> {
        if FLAGS.set(flags).is_err() {
            debug!("Signal handlers already installed");
            return Ok(());
        }

        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for &signal in signals {
            // SAFETY: the handler only performs atomic operations on flags
            // that live for the rest of the process.
            let previous = unsafe { libc::signal(signal, handler) };
            if previous == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
        }

        debug!("Installed handlers for signals {:?}", signals);
        Ok(())
    }
}

#[cfg(unix)]
pub use unix::install_signal_handlers;
