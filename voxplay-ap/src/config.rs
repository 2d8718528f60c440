//! voxplay-ap specific configuration
//!
//! Merges command-line overrides over the TOML configuration.

use crate::error::Result;
use std::path::PathBuf;
use voxplay_common::{AudioConfig, ConfigResolver};

/// Values given on the command line; None = keep the file/default value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub device_index: Option<usize>,
    /// Master volume as a percentage (0 to 100)
    pub volume_percent: Option<u8>,
}

/// Audio Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub audio: AudioConfig,
    pub log_level: String,
    /// Device index from the command line, applied after the first listing
    pub device_index: Option<usize>,
}

impl Config {
    /// Resolve the configuration file and apply `overrides`.
    ///
    /// # Errors
    /// `Error::Config` if an explicit file is missing or any file is malformed.
    pub fn load(overrides: CliOverrides) -> Result<Self> {
        let file = ConfigResolver::new(overrides.config_path.clone()).load()?;
        Ok(Self::merge(file.audio, file.logging.level, overrides))
    }

    fn merge(mut audio: AudioConfig, log_level: String, overrides: CliOverrides) -> Self {
        if let Some(host) = overrides.host {
            audio.host = Some(host);
        }
        if let Some(percent) = overrides.volume_percent {
            audio.volume = f32::from(percent.min(100)) / 100.0;
        }
        Self {
            audio,
            log_level,
            device_index: overrides.device_index,
        }
    }
}
