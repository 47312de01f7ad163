//! Device Output Stream
//!
//! [`CpalSink`] is the [`PcmSink`] for real hardware. The playback thread
//! pushes i16 frames into an `rtrb` ring buffer and the cpal output
//! callback drains it.
//!
//! ```text
//!   playback thread                       device callback
//!   write() ──blocks while full──▶ rtrb ──▶ i16 → f32 ──▶ speakers
//!                                   │
//!                                   └── ran dry after priming? set underrun
//! ```
//!
//! The blocking write is what paces the playback loop to real time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, info};

use crate::config::{OutputConfig, StreamFormat};
use crate::error::{PlayerError, PlayerResult, SinkError};
use crate::output::PcmSink;

/// Sleep between attempts while the ring is full
const WRITE_POLL: Duration = Duration::from_millis(2);

/// State shared between the writer and the device callback
#[derive(Debug, Default)]
struct SinkShared {
    /// Data has flowed since the last (re)arm; running dry now is an underrun
    primed: AtomicBool,
    underrun: AtomicBool,
    /// Set by the stream error callback
    failed: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl SinkShared {
    fn fail(&self, message: String) {
        *self.failure.lock() = Some(message);
        self.failed.store(true, Ordering::Release);
    }

    fn take_failure(&self) -> Option<String> {
        if self.failed.swap(false, Ordering::Acquire) {
            Some(
                self.failure
                    .lock()
                    .take()
                    .unwrap_or_else(|| "stream error".to_string()),
            )
        } else {
            None
        }
    }
}

/// Output sink on a cpal device
pub struct CpalSink {
    /// Kept alive to keep audio flowing
    #[allow(dead_code)]
    stream: Stream,
    producer: Producer<i16>,
    shared: Arc<SinkShared>,
    format: StreamFormat,
    /// Samples to write after a (re)arm before underruns count
    prime_samples: usize,
    written_since_arm: usize,
    device_name: String,
}

impl CpalSink {
    /// Open the configured (or default) output device for `format`
    pub fn open(format: StreamFormat, config: &OutputConfig) -> PlayerResult<Self> {
        format.validate().map_err(PlayerError::ConfigError)?;

        let device = Self::find_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());

        let capacity = config.buffer_frames as usize * format.channels as usize;
        let (producer, consumer) = RingBuffer::<i16>::new(capacity);
        let shared = Arc::new(SinkShared::default());

        let cpal_config = CpalStreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = Self::build_output_stream(&device, &cpal_config, consumer, Arc::clone(&shared))?;
        stream.play().map_err(|e| {
            error!("Failed to start output on {}: {}", device_name, e);
            PlayerError::StreamPlayError(e.to_string())
        })?;

        info!(
            "Opened {} at {}Hz, {} channels, {} frame buffer",
            device_name, format.sample_rate, format.channels, config.buffer_frames
        );

        Ok(Self {
            stream,
            producer,
            shared,
            format,
            prime_samples: capacity / 2,
            written_since_arm: 0,
            device_name,
        })
    }

    fn find_device(name: Option<&str>) -> PlayerResult<Device> {
        let host = cpal::default_host();

        match name {
            Some(wanted) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| PlayerError::DeviceOpenError(e.to_string()))?;
                devices
                    .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                    .ok_or_else(|| PlayerError::DeviceNotFound(wanted.to_string()))
            }
            None => host.default_output_device().ok_or(PlayerError::NoDevicesFound),
        }
    }

    fn build_output_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut consumer: Consumer<i16>,
        shared: Arc<SinkShared>,
    ) -> PlayerResult<Stream> {
        let err_shared = Arc::clone(&shared);

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    fill_output(&mut consumer, data, &shared);
                },
                move |err| {
                    err_shared.fail(err.to_string());
                },
                None,
            )
            .map_err(|e| PlayerError::StreamBuildError(e.to_string()))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    fn note_written(&mut self, samples: usize) {
        self.written_since_arm += samples;
        if self.written_since_arm >= self.prime_samples {
            self.shared.primed.store(true, Ordering::Relaxed);
        }
    }
}

impl PcmSink for CpalSink {
    fn write(&mut self, pcm: &[i16], frames: usize) -> Result<usize, SinkError> {
        if let Some(message) = self.shared.take_failure() {
            return Err(SinkError::Device(message));
        }
        if self.shared.underrun.load(Ordering::Relaxed) {
            return Err(SinkError::Underrun);
        }

        let samples = (frames * self.format.channels as usize).min(pcm.len());
        let mut remaining = &pcm[..samples];

        while !remaining.is_empty() {
            let free = self.producer.slots().min(remaining.len());
            if free == 0 {
                if self.producer.is_abandoned() {
                    return Err(SinkError::Device("output stream closed".to_string()));
                }
                if let Some(message) = self.shared.take_failure() {
                    return Err(SinkError::Device(message));
                }
                std::thread::sleep(WRITE_POLL);
                continue;
            }

            let pushed = match self.producer.write_chunk_uninit(free) {
                Ok(chunk) => chunk.fill_from_iter(remaining[..free].iter().copied()),
                Err(_) => 0,
            };
            remaining = &remaining[pushed..];
            self.note_written(pushed);
        }

        Ok(frames)
    }

    fn recover(&mut self) -> Result<(), SinkError> {
        self.shared.underrun.store(false, Ordering::Relaxed);
        self.shared.primed.store(false, Ordering::Relaxed);
        self.written_since_arm = 0;
        Ok(())
    }

    fn drain(&mut self) {
        let capacity = self.producer.buffer().capacity();
        let ring_ms = self.format.frames_to_ms(capacity / self.format.channels as usize);
        let deadline = Instant::now() + Duration::from_millis(ring_ms as u64 * 2 + 100);

        while self.producer.slots() < capacity && Instant::now() < deadline {
            if self.producer.is_abandoned() || self.shared.failed.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(WRITE_POLL);
        }

        // Running dry after this point is the end of the track, not an underrun
        self.shared.primed.store(false, Ordering::Relaxed);
        debug!("Drained output on {}", self.device_name);
    }
}

/// Device callback body: ring → f32 output, silence when dry
fn fill_output(consumer: &mut Consumer<i16>, data: &mut [f32], shared: &SinkShared) {
    let to_read = data.len().min(consumer.slots());

    if let Ok(chunk) = consumer.read_chunk(to_read) {
        let (first, second) = chunk.as_slices();
        for (out, &sample) in data.iter_mut().zip(first.iter().chain(second)) {
            *out = f32::from(sample) / 32768.0;
        }
        chunk.commit_all();
    }

    if to_read < data.len() {
        data[to_read..].fill(0.0);
        if shared.primed.load(Ordering::Relaxed) {
            shared.underrun.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_output_converts_samples() {
        let (mut producer, mut consumer) = RingBuffer::<i16>::new(8);
        for s in [16384_i16, -16384, 32767, -32768] {
            producer.push(s).unwrap();
        }
        let shared = SinkShared::default();

        let mut data = [1.0_f32; 4];
        fill_output(&mut consumer, &mut data, &shared);
        assert_eq!(data[0], 0.5);
        assert_eq!(data[1], -0.5);
        assert_eq!(data[3], -1.0);
        assert!(!shared.underrun.load(Ordering::Relaxed));
    }

    #[test]
    fn test_dry_ring_before_priming_is_silent_not_underrun() {
        let (_producer, mut consumer) = RingBuffer::<i16>::new(8);
        let shared = SinkShared::default();

        let mut data = [1.0_f32; 6];
        fill_output(&mut consumer, &mut data, &shared);
        assert!(data.iter().all(|&s| s == 0.0));
        assert!(!shared.underrun.load(Ordering::Relaxed));
    }

    #[test]
    fn test_dry_ring_after_priming_flags_underrun() {
        let (mut producer, mut consumer) = RingBuffer::<i16>::new(8);
        producer.push(1000).unwrap();
        let shared = SinkShared::default();
        shared.primed.store(true, Ordering::Relaxed);

        let mut data = [1.0_f32; 4];
        fill_output(&mut consumer, &mut data, &shared);
        assert!(data[0] > 0.0);
        assert_eq!(&data[1..], &[0.0, 0.0, 0.0]);
        assert!(shared.underrun.load(Ordering::Relaxed));
    }

    #[test]
    fn test_failure_is_taken_once() {
        let shared = SinkShared::default();
        assert!(shared.take_failure().is_none());
        shared.fail("device unplugged".to_string());
        assert_eq!(shared.take_failure().as_deref(), Some("device unplugged"));
        assert!(shared.take_failure().is_none());
    }

    // Hardware-dependent tests
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default_device() {
        let format = StreamFormat::new(44100, 2);
        let mut sink = CpalSink::open(format, &OutputConfig::default()).unwrap();
        let silence = vec![0_i16; 735 * 2];
        for _ in 0..10 {
            sink.write(&silence, 735).unwrap();
        }
        sink.drain();
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_unknown_device_is_not_found() {
        let config = OutputConfig {
            device: Some("no such device".to_string()),
            ..Default::default()
        };
        let result = CpalSink::open(StreamFormat::default(), &config);
        assert!(matches!(result, Err(PlayerError::DeviceNotFound(_))));
    }
}
