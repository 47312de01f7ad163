//! Pocket - command line player
//!
//! Plays raw PCM dumps through the default output device with scope
//! synchronization, end-of-track fade and a toggleable tone shelf.
//!
//! Ctrl+C skips to the next track; press it twice within 1.5 s to quit.
//! `kill -USR2 <pid>` toggles the bass boost.

mod raw;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pocket_core::{ControlFlags, CpalSink, Player, PlayerConfig, ScopeBuffers, StreamFormat};

use crate::raw::RawPcmLoader;
use crate::status::StatusOptions;

#[derive(Parser, Debug)]
#[command(name = "pocket")]
#[command(version, about = "Handheld music player audio core", long_about = None)]
struct Cli {
    /// Raw s16le PCM files to play, in order
    #[arg(required_unless_present = "save_config")]
    files: Vec<PathBuf>,

    /// Start with the bass boost (tone shelf) enabled
    #[arg(short = 'b', long)]
    bass: bool,

    /// Default track length in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    default_length: Option<u32>,

    /// Ignore track length (use default length)
    #[arg(short = 'i', long)]
    ignore_length: bool,

    /// Endless play: no fade, no time limit
    #[arg(short = 'e', long)]
    endless: bool,

    /// Play the files in random order
    #[arg(short = 'r', long)]
    random: bool,

    /// Quiet; don't display informational output
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Sample rate of the input files
    #[arg(long, default_value_t = 44100)]
    rate: u32,

    /// Channel count of the input files
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Output device name (default: system default)
    #[arg(long)]
    device: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show per-channel scope levels on the status line
    #[arg(long)]
    levels: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Command line flags override the config file
    fn apply(&self, config: &mut PlayerConfig) {
        if self.bass {
            config.tone.enabled_at_start = true;
        }
        if let Some(length) = self.default_length {
            config.timing.default_length_ms = length;
        }
        if self.ignore_length {
            config.timing.ignore_track_length = true;
        }
        if self.endless {
            config.timing.endless = true;
        }
        if let Some(device) = &self.device {
            config.output.device = Some(device.clone());
        }
    }

    /// Files in play order
    fn playlist<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<PathBuf> {
        let mut files = self.files.clone();
        if self.random {
            files.shuffle(rng);
        }
        files
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing for logging (stderr keeps the status line clean)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => PlayerConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlayerConfig::load(),
    };
    cli.apply(&mut config);
    config.validate().map_err(|e| anyhow!(e))?;

    if cli.save_config {
        let path = cli
            .config
            .clone()
            .or_else(PlayerConfig::config_path)
            .ok_or_else(|| anyhow!("no config directory on this platform"))?;
        config.save_to(&path)?;
        return Ok(());
    }

    let format = StreamFormat::new(cli.rate, cli.channels);
    format.validate().map_err(|e| anyhow!(e))?;

    let controls = Arc::new(ControlFlags::new(config.tone.enabled_at_start));
    #[cfg(unix)]
    pocket_core::install_signal_handlers(Arc::clone(&controls))
        .context("installing signal handlers")?;

    info!("Starting Pocket with {} tracks", cli.files.len());

    let scope = Arc::new(ScopeBuffers::new());
    let (event_sender, event_receiver) = crossbeam_channel::unbounded();
    let output_config = config.output.clone();

    let playlist = cli.playlist(&mut rand::rng());
    let player = Player::new(config, Arc::clone(&scope), controls, event_sender);
    let handle = player.spawn(playlist, RawPcmLoader::new(format), move |format| {
        CpalSink::open(format, &output_config)
    })?;

    status::run(
        &event_receiver,
        &scope,
        StatusOptions {
            quiet: cli.quiet,
            levels: cli.levels,
        },
    );

    handle
        .join()
        .map_err(|_| anyhow!("playback thread panicked"))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["pocket", "-b", "-i", "-t", "90000", "a.raw", "b.raw"]);
        let mut config = PlayerConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.files.len(), 2);
        assert!(config.tone.enabled_at_start);
        assert!(config.timing.ignore_track_length);
        assert_eq!(config.timing.default_length_ms, 90_000);
        assert!(!config.timing.endless);
    }

    #[test]
    fn test_in_order_without_random() {
        let cli = Cli::parse_from(["pocket", "a.raw", "b.raw", "c.raw"]);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(cli.playlist(&mut rng), cli.files);
    }

    #[test]
    fn test_random_order_is_permutation() {
        let names: Vec<String> = (0..32).map(|i| format!("track{i:02}.raw")).collect();
        let cli = Cli::parse_from(
            ["pocket", "-r"]
                .into_iter()
                .map(String::from)
                .chain(names.iter().cloned()),
        );
        assert!(cli.random);

        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = cli.playlist(&mut rng);
        assert_eq!(shuffled.len(), cli.files.len());
        assert_ne!(shuffled, cli.files);

        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, cli.files);
    }

    #[test]
    fn test_files_required() {
        assert!(Cli::try_parse_from(["pocket"]).is_err());
    }

    #[test]
    fn test_save_config_needs_no_files() {
        let cli = Cli::try_parse_from(["pocket", "--save-config", "-b"]).unwrap();
        assert!(cli.save_config);
        assert!(cli.files.is_empty());
    }
}
