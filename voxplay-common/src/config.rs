//! Configuration loading and config file resolution
//!
//! The configuration file is optional. It is located in this priority order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `VOXPLAY_CONFIG` environment variable
//! 3. User config directory (`~/.config/voxplay/config.toml` on Linux)
//! 4. System config (`/etc/voxplay/config.toml`, Linux only)
//!
//! When no file is found the compiled defaults are used. A file that exists but
//! cannot be parsed is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VOXPLAY_CONFIG";

/// Rate the playback device is asked to open at
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Channel count the playback device is asked to open with
pub const DEFAULT_CHANNELS: u16 = 2;

/// Upper bound on simultaneously registered sounds
pub const DEFAULT_MAX_SOUNDS: usize = 64;

/// Top-level TOML configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

/// `[audio]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Backend host name (e.g. "alsa", "jack", "wasapi"). None = platform default.
    pub host: Option<String>,

    /// Preferred output device display name, selected at startup when present
    pub device: Option<String>,

    /// Sample rate requested from the output device
    pub sample_rate: u32,

    /// Channel count requested from the output device
    pub channels: u16,

    /// Output buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,

    /// Initial master volume (0.0 to 1.0)
    pub volume: f32,

    /// Maximum number of sounds mixed at once
    pub max_sounds: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            host: None,
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_size: None,
            volume: 1.0,
            max_sounds: DEFAULT_MAX_SOUNDS,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level, used when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if audio.channels == 0 {
            return Err(Error::Config("audio.channels must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&audio.volume) {
            return Err(Error::Config(format!(
                "audio.volume must be within 0.0..=1.0, got {}",
                audio.volume
            )));
        }
        if audio.max_sounds == 0 {
            return Err(Error::Config("audio.max_sounds must be positive".to_string()));
        }
        if audio.buffer_size == Some(0) {
            return Err(Error::Config("audio.buffer_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Locates and loads the configuration file.
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a resolver; `explicit_path` comes from the command line.
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Find the config file to use, if any.
    ///
    /// An explicit path is returned even if it does not exist so that `load`
    /// can report it; every other candidate must exist.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            warn!(
                "{} points to {} which does not exist, ignoring",
                CONFIG_ENV_VAR,
                path.display()
            );
        }

        if let Some(user_config) = dirs::config_dir().map(|d| d.join("voxplay").join("config.toml")) {
            if user_config.exists() {
                return Some(user_config);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/voxplay/config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration, falling back to compiled defaults when no file exists.
    pub fn load(&self) -> Result<TomlConfig> {
        match self.locate() {
            Some(path) => {
                if self.explicit_path.as_ref() == Some(&path) && !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                let config = TomlConfig::from_file(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                debug!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}
