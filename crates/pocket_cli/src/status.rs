//! Terminal status output
//!
//! Consumes player events on the main thread and prints track info plus a
//! carriage-return status line to stdout. Logging goes to stderr.

use std::io::{self, Write};

use crossbeam_channel::Receiver;

use pocket_core::{
    format_clock, Event, FinishReason, ScopeBuffers, TrackTiming, SCOPE_CHANNELS,
};

const BOLD: &str = "\x1b[36m";
const NORMAL: &str = "\x1b[0m";

/// Status line options
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOptions {
    /// Print nothing but errors
    pub quiet: bool,
    /// Append scope channel levels to the status line
    pub levels: bool,
}

/// Print events until the player exits
pub fn run(events: &Receiver<Event>, scope: &ScopeBuffers, options: StatusOptions) {
    let stdout = io::stdout();
    let mut timing = TrackTiming::new(0, 0);

    for event in events.iter() {
        let mut out = stdout.lock();
        match event {
            Event::TrackStarted {
                path,
                title,
                sample_rate,
                channels,
                length_ms,
                fade_ms,
                endless,
            } => {
                timing = TrackTiming {
                    length_ms,
                    fade_ms,
                    endless,
                };
                if !options.quiet {
                    let _ = writeln!(out, "{BOLD}Filename: {NORMAL}{path}");
                    if let Some(title) = title {
                        let _ = writeln!(out, "{BOLD}Title: {NORMAL}{title}");
                    }
                    let _ = writeln!(out, "{BOLD}Channels: {NORMAL}{channels}");
                    let _ = writeln!(out, "{BOLD}Sample rate: {NORMAL}{sample_rate}");
                    let _ = writeln!(out, "{BOLD}Fade: {NORMAL}{fade_ms} ms");
                    let _ = writeln!(out, "{BOLD}Length: {NORMAL}{length_ms} ms");
                }
            }
            Event::Progress { position_ms, .. } => {
                if !options.quiet {
                    let mut line = status_line(position_ms, &timing);
                    if options.levels {
                        line.push_str(&levels_line(scope));
                    }
                    let _ = write!(out, "{line}     \r");
                    let _ = out.flush();
                }
            }
            Event::ToneToggled { enabled } => {
                if !options.quiet {
                    let _ = writeln!(out, "\nBASS BOOST {}", if enabled { "ON" } else { "OFF" });
                }
            }
            Event::TrackFinished { reason, .. } => {
                if !options.quiet {
                    if reason == FinishReason::DecoderError {
                        let _ = writeln!(out, "\n(decoder error)");
                    }
                    let _ = writeln!(out, "\n--");
                }
            }
            Event::TrackSkipped { path, reason } => {
                let _ = writeln!(io::stderr(), "Skipped {path}: {reason}");
            }
            Event::Error { message } => {
                let _ = writeln!(io::stderr(), "Error: {message}");
            }
            Event::UnderrunRecovered { .. } => {}
            Event::Exiting => break,
        }
    }
}

/// `Time: mm:ss.cc [remaining] of length`
pub fn status_line(position_ms: f64, timing: &TrackTiming) -> String {
    let mut line = format!("Time: {} ", format_clock(position_ms));
    if !timing.endless {
        line.push_str(&format!(
            "[{}] of {}",
            format_clock(f64::from(timing.remaining_ms(position_ms))),
            format_clock(f64::from(timing.length_ms))
        ));
    }
    line
}

/// Peak-to-peak of each scope channel's visible window
fn levels_line(scope: &ScopeBuffers) -> String {
    scope.read(|set| {
        let mut line = String::from("  scope:");
        for ch in 0..SCOPE_CHANNELS {
            let window = set.channel(ch).window();
            let min = window.iter().copied().min().unwrap_or(0);
            let max = window.iter().copied().max().unwrap_or(0);
            line.push_str(&format!(" {:>5}", max - min));
        }
        line
    })
}
