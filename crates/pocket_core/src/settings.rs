//! Configuration File Loading
//!
//! Reads the player configuration from disk. Only configuration lives here;
//! runtime state such as the tone toggle is never written back.
//!
//! # Storage Locations
//! - Linux: `~/.config/pocket-player/config.json`
//! - Windows: `%APPDATA%\pocket\pocket-player\config\config.json`
//! - macOS: `~/Library/Application Support/org.pocket.pocket-player/config.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{error, info};

use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerResult};

impl PlayerConfig {
    /// Load config from the default location, or return default if missing/corrupt
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => {
                        info!("Config loaded from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        error!("Failed to load config file {:?}: {}", path, e);
                    }
                }
            }
        }

        info!("Using default config");
        Self::default()
    }

    /// Load and validate config from an explicit path
    pub fn load_from(path: &Path) -> PlayerResult<Self> {
        let file = fs::File::open(path)?;
        let config: PlayerConfig = serde_json::from_reader(file)?;
        config.validate().map_err(PlayerError::ConfigError)?;
        Ok(config)
    }

    /// Write config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> PlayerResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;

        info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "pocket", "pocket-player")
            .map(|proj| proj.config_dir().join("config.json"))
    }
}
