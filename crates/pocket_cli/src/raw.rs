//! Raw PCM Tracks
//!
//! Headerless signed 16-bit little-endian PCM, as dumped by an emulator
//! core. Format comes from the command line and timing from the configured
//! defaults; the title is the file name.
//!
//! Raw dumps carry no per-channel synthesis taps, so the direct-sound scope
//! channels show the left and right output and the PSG channels stay flat.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use pocket_core::{
    ChannelScales, Chunk, DecodeError, Decoder, LoadedTrack, StreamFormat, TickStatus,
    TrackLoader, TrackTags, MAX_CHUNK_FRAMES,
};

/// Decoder over a raw s16le file
pub struct RawPcmDecoder<R> {
    reader: R,
    format: StreamFormat,
    frames_per_tick: usize,
    bytes: Vec<u8>,
}

impl<R: Read + Send> RawPcmDecoder<R> {
    pub fn new(reader: R, format: StreamFormat, frames_per_tick: usize) -> Self {
        let frames_per_tick = frames_per_tick.clamp(1, MAX_CHUNK_FRAMES);
        Self {
            reader,
            format,
            frames_per_tick,
            bytes: vec![0; frames_per_tick * format.bytes_per_frame()],
        }
    }

    /// Read until `bytes` is full or the input ends; returns bytes read
    fn fill(&mut self) -> Result<usize, DecodeError> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Send> Decoder for RawPcmDecoder<R> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn tick(&mut self, chunk: &mut Chunk) -> Result<TickStatus, DecodeError> {
        let filled = self.fill()?;
        let frame_bytes = self.format.bytes_per_frame();
        let frames = filled / frame_bytes;
        let channels = self.format.channels as usize;

        chunk.pcm.extend(
            self.bytes[..frames * frame_bytes]
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );

        for frame in chunk.pcm.chunks_exact(channels) {
            let left = frame[0];
            let right = frame[channels - 1];
            chunk.direct[0].push(left);
            chunk.direct[1].push(right);
        }
        for tap in &mut chunk.psg {
            tap.resize(frames, 0);
        }
        chunk.scales = ChannelScales::default();

        if filled < self.bytes.len() {
            Ok(TickStatus::EndOfTrack)
        } else {
            Ok(TickStatus::Continue)
        }
    }
}

/// Opens raw tracks at a fixed format
pub struct RawPcmLoader {
    format: StreamFormat,
    frames_per_tick: usize,
}

impl RawPcmLoader {
    /// One tick per video frame (60 Hz), like the emulated hardware
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            frames_per_tick: (format.sample_rate / 60) as usize,
        }
    }
}

impl TrackLoader for RawPcmLoader {
    type Decoder = RawPcmDecoder<BufReader<File>>;

    fn load(&mut self, path: &Path) -> Result<LoadedTrack<Self::Decoder>, DecodeError> {
        let file = File::open(path).map_err(|e| DecodeError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tags = TrackTags {
            title: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
            ..Default::default()
        };

        Ok(LoadedTrack {
            decoder: RawPcmDecoder::new(BufReader::new(file), self.format, self.frames_per_tick),
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pocket-cli-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_stereo_ticks_and_taps() {
        let samples: Vec<i16> = (0..20).map(|i| if i % 2 == 0 { i } else { -i }).collect();
        let mut decoder =
            RawPcmDecoder::new(Cursor::new(pcm_bytes(&samples)), StreamFormat::new(8000, 2), 4);
        let mut chunk = Chunk::with_capacity(2);

        assert_eq!(decoder.tick(&mut chunk).unwrap(), TickStatus::Continue);
        assert_eq!(chunk.pcm, vec![0, -1, 2, -3, 4, -5, 6, -7]);
        assert_eq!(chunk.direct[0], vec![0, 2, 4, 6]);
        assert_eq!(chunk.direct[1], vec![-1, -3, -5, -7]);
        assert_eq!(chunk.validate(&decoder.format()).unwrap(), 4);

        chunk.clear();
        assert_eq!(decoder.tick(&mut chunk).unwrap(), TickStatus::Continue);
        chunk.clear();
        // 10 frames total: the last tick is short
        assert_eq!(decoder.tick(&mut chunk).unwrap(), TickStatus::EndOfTrack);
        assert_eq!(chunk.validate(&decoder.format()).unwrap(), 2);
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let mut bytes = pcm_bytes(&[1, 2, 3, 4]);
        bytes.push(0xff);
        let mut decoder = RawPcmDecoder::new(Cursor::new(bytes), StreamFormat::new(8000, 2), 8);
        let mut chunk = Chunk::with_capacity(2);

        assert_eq!(decoder.tick(&mut chunk).unwrap(), TickStatus::EndOfTrack);
        assert_eq!(chunk.pcm, vec![1, 2, 3, 4]);
        assert!(chunk.validate(&decoder.format()).is_ok());
    }

    #[test]
    fn test_mono_feeds_both_direct_taps() {
        let mut decoder =
            RawPcmDecoder::new(Cursor::new(pcm_bytes(&[5, 6, 7])), StreamFormat::new(8000, 1), 3);
        let mut chunk = Chunk::with_capacity(1);

        decoder.tick(&mut chunk).unwrap();
        assert_eq!(chunk.direct[0], vec![5, 6, 7]);
        assert_eq!(chunk.direct[1], vec![5, 6, 7]);
        assert!(chunk.psg.iter().all(|tap| tap == &vec![0; 3]));
    }

    #[test]
    fn test_tick_is_capped_to_max_chunk() {
        let decoder = RawPcmDecoder::new(Cursor::new(Vec::new()), StreamFormat::new(96000, 2), 5000);
        assert_eq!(decoder.frames_per_tick, MAX_CHUNK_FRAMES);
    }

    #[test]
    fn test_loader_titles_from_file_name() {
        let path = temp_path("stage1.raw");
        fs::write(&path, pcm_bytes(&[0; 64])).unwrap();

        let mut loader = RawPcmLoader::new(StreamFormat::new(44100, 2));
        let track = loader.load(&path).unwrap();
        assert_eq!(track.tags.title.as_deref(), Some("stage1"));
        assert_eq!(track.tags.length_ms, None);
        assert_eq!(track.decoder.frames_per_tick, 735);
    }

    #[test]
    fn test_loader_missing_file() {
        let mut loader = RawPcmLoader::new(StreamFormat::default());
        let result = loader.load(Path::new("/nonexistent/track.raw"));
        assert!(matches!(result, Err(DecodeError::Load { .. })));
    }
}
