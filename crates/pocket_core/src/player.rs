//! Playback Loop
//!
//! Runs a playlist on a single thread:
//!
//! ```text
//!   ┌─────────┐  track loaded   ┌─────────┐
//!   │ Stopped │ ──────────────▶ │ Playing │ ◀─┐ one chunk per pass
//!   └─────────┘ ◀────────────── └─────────┘ ──┘
//!        │       end / time / interrupt
//!        │ double interrupt, or playlist done
//!        ▼
//!   ┌─────────┐
//!   │ Exiting │
//!   └─────────┘
//! ```
//!
//! Each pass ticks the decoder once, feeds all six scope channels and
//! publishes them, runs fade and tone shelf on a copy of the PCM, then
//! hands it to output delivery, which blocks until the device has room.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use crate::config::{PlayerConfig, StreamFormat};
use crate::control::{ControlFlags, InterruptAction, InterruptTracker};
use crate::decoder::{Chunk, Decoder, LoadedTrack, TickStatus, TrackLoader};
use crate::error::{DecodeError, PlayerError, PlayerResult};
use crate::message::{Event, FinishReason};
use crate::output::{Delivery, OutputDelivery, PcmSink};
use crate::pipeline::ChunkPipeline;
use crate::scope::ScopeBuffers;
use crate::track::TrackTiming;

/// Playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Exiting,
}

/// The playback loop and everything it carries between tracks
pub struct Player {
    config: PlayerConfig,
    scope: Arc<ScopeBuffers>,
    controls: Arc<ControlFlags>,
    events: Sender<Event>,
    state: PlayerState,
    interrupts: InterruptTracker,
    /// Reused for every tick of every track
    chunk: Chunk,
}

impl Player {
    pub fn new(
        config: PlayerConfig,
        scope: Arc<ScopeBuffers>,
        controls: Arc<ControlFlags>,
        events: Sender<Event>,
    ) -> Self {
        let window = Duration::from_millis(config.controls.double_interrupt_ms);
        Self {
            config,
            scope,
            controls,
            events,
            state: PlayerState::Stopped,
            interrupts: InterruptTracker::new(window),
            chunk: Chunk::with_capacity(2),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Run the loop on a dedicated thread
    ///
    /// `open_sink` is called on that thread, once per track.
    pub fn spawn<L, S, F>(
        mut self,
        playlist: Vec<PathBuf>,
        mut loader: L,
        mut open_sink: F,
    ) -> PlayerResult<JoinHandle<PlayerResult<()>>>
    where
        L: TrackLoader + Send + 'static,
        S: PcmSink,
        F: FnMut(StreamFormat) -> PlayerResult<S> + Send + 'static,
    {
        thread::Builder::new()
            .name("pocket-playback".into())
            .spawn(move || self.run(&playlist, &mut loader, &mut open_sink))
            .map_err(|e| PlayerError::ThreadSpawn(e.to_string()))
    }

    /// Play every track in order until the playlist ends or an exit is requested
    ///
    /// Only a failure to open the output device is returned as an error.
    pub fn run<L, S, F>(
        &mut self,
        playlist: &[PathBuf],
        loader: &mut L,
        open_sink: &mut F,
    ) -> PlayerResult<()>
    where
        L: TrackLoader,
        S: PcmSink,
        F: FnMut(StreamFormat) -> PlayerResult<S>,
    {
        info!("Playback thread started with {} tracks", playlist.len());

        let result = self.run_playlist(playlist, loader, open_sink);
        if let Err(e) = &result {
            error!("Playback stopped: {}", e);
            self.emit(Event::error(e));
        }

        self.state = PlayerState::Exiting;
        self.emit(Event::Exiting);
        info!("Playback thread exiting");
        result
    }

    fn run_playlist<L, S, F>(
        &mut self,
        playlist: &[PathBuf],
        loader: &mut L,
        open_sink: &mut F,
    ) -> PlayerResult<()>
    where
        L: TrackLoader,
        S: PcmSink,
        F: FnMut(StreamFormat) -> PlayerResult<S>,
    {
        for path in playlist {
            // Between tracks only a double interrupt matters
            if self.poll_interrupts() == Some(InterruptAction::Exit) {
                self.state = PlayerState::Exiting;
            }
            if self.state == PlayerState::Exiting {
                break;
            }

            let track = match loader.load(path) {
                Ok(track) => track,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    self.emit(Event::TrackSkipped {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            self.play_track(path, track, open_sink)?;
        }
        Ok(())
    }

    fn play_track<D, S, F>(
        &mut self,
        path: &Path,
        track: LoadedTrack<D>,
        open_sink: &mut F,
    ) -> PlayerResult<()>
    where
        D: Decoder,
        S: PcmSink,
        F: FnMut(StreamFormat) -> PlayerResult<S>,
    {
        let LoadedTrack { mut decoder, tags } = track;
        let format = decoder.format();
        let path_str = path.display().to_string();

        if format.validate().is_err() {
            let e = DecodeError::UnsupportedFormat {
                sample_rate: format.sample_rate,
                channels: format.channels,
            };
            warn!("Skipping {}: {}", path_str, e);
            self.emit(Event::TrackSkipped {
                path: path_str,
                reason: e.to_string(),
            });
            return Ok(());
        }

        let timing = TrackTiming::resolve(&tags, &self.config.timing);
        let envelope = timing.envelope(&self.config.timing);
        let mut pipeline = ChunkPipeline::new(
            format,
            envelope,
            &self.config.tone,
            self.controls.tone_flag(),
        )?;
        debug!(
            "Track setup: {:?}, stages {:?}",
            timing,
            pipeline.stages()
        );

        let sink = open_sink(format)?;
        let mut output = OutputDelivery::new(sink, format);

        self.state = PlayerState::Playing;
        info!(
            "Playing {} ({}Hz, {} ch, {} ms, fade {} ms)",
            path_str, format.sample_rate, format.channels, timing.length_ms, timing.fade_ms
        );
        self.emit(Event::TrackStarted {
            path: path_str.clone(),
            title: tags.title.clone(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            length_ms: timing.length_ms,
            fade_ms: timing.fade_ms,
            endless: timing.endless,
        });

        let mut tone_enabled = self.controls.tone_enabled();
        let reason = loop {
            match self.poll_interrupts() {
                Some(InterruptAction::Exit) => {
                    self.state = PlayerState::Exiting;
                    break FinishReason::Interrupted;
                }
                Some(InterruptAction::StopTrack) => break FinishReason::Interrupted,
                None => {}
            }

            let tone_now = self.controls.tone_enabled();
            if tone_now != tone_enabled {
                tone_enabled = tone_now;
                info!("Tone shelf {}", if tone_enabled { "ON" } else { "OFF" });
                self.emit(Event::ToneToggled {
                    enabled: tone_enabled,
                });
            }

            if timing.is_finished(output.position_ms()) {
                break FinishReason::TimeElapsed;
            }

            self.chunk.clear();
            let status = match decoder.tick(&mut self.chunk) {
                Ok(status) => status,
                Err(e) => {
                    warn!("Decoder error in {}: {}", path_str, e);
                    break FinishReason::DecoderError;
                }
            };
            if let Err(e) = self.chunk.validate(&format) {
                warn!("Decoder error in {}: {}", path_str, e);
                break FinishReason::DecoderError;
            }

            if !self.chunk.is_empty() {
                self.scope.update_chunk(&self.chunk);
                self.scope.publish();

                let processed = match pipeline.process(&self.chunk.pcm, output.position_ms()) {
                    Ok(processed) => processed,
                    Err(e) => {
                        warn!("Processing error in {}: {}", path_str, e);
                        break FinishReason::DecoderError;
                    }
                };
                match output.deliver(processed) {
                    Delivery::Written(_) => {}
                    Delivery::Recovered | Delivery::Dropped => {
                        self.emit(Event::UnderrunRecovered {
                            count: output.underruns(),
                        });
                    }
                }

                self.emit(Event::Progress {
                    position_ms: output.position_ms(),
                    length_ms: timing.length_ms,
                });
            }

            if status == TickStatus::EndOfTrack {
                break FinishReason::EndOfTrack;
            }
        };

        let position_ms = output.position_ms();
        let underruns = output.underruns();
        output.finish();

        if self.state != PlayerState::Exiting {
            self.state = PlayerState::Stopped;
        }
        info!(
            "Finished {} at {:.0} ms ({:?}, {} underruns)",
            path_str, position_ms, reason, underruns
        );
        self.emit(Event::TrackFinished {
            path: path_str,
            reason,
        });
        Ok(())
    }

    /// Fold pending interrupts through the tracker
    fn poll_interrupts(&mut self) -> Option<InterruptAction> {
        let pending = self.controls.take_interrupts();
        let mut action = None;
        for _ in 0..pending {
            let observed = self.interrupts.observe(Instant::now());
            if action != Some(InterruptAction::Exit) {
                action = Some(observed);
            }
        }
        action
    }

    fn emit(&self, event: Event) {
        // Nobody listening is fine
        let _ = self.events.try_send(event);
    }
}
