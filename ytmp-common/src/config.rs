//! Configuration file loading and path resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `YTMP_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/ytmp/config.toml`), if it exists
//! 4. Compiled defaults (no file)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.
//! A file that exists but cannot be parsed is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "YTMP_CONFIG";

/// Logging section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Raw contents of `config.toml`
///
/// Every key is optional; consumers apply their own defaults and validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Loudness normalization target (LUFS)
    pub target_lufs: Option<f64>,

    /// Initial user volume multiplier
    pub volume: Option<f64>,

    /// Progress publication interval (milliseconds)
    pub tick_interval_ms: Option<u64>,

    /// Width of one visualizer bar in pixels
    pub waveform_bar_width_px: Option<u32>,

    /// Base URL of the HTTP audio byte source
    pub audio_base_url: Option<String>,

    /// Directory holding `<track id>.<ext>` audio files
    pub music_folder: Option<PathBuf>,

    /// Event bus capacity
    pub event_capacity: Option<usize>,

    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a config file.
    ///
    /// # Errors
    /// - `Error::Io` when the file cannot be read
    /// - `Error::Config` when the TOML is malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the resolved config file, falling back to defaults when no file
    /// is configured or the configured file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file configured, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        debug!("Loading config file {}", path.display());
        Self::load(path)
    }
}

/// Resolves which config file (if any) should be loaded
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
    env_var_name: String,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self {
            cli_path,
            env_var_name: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Override the environment variable consulted at priority 2
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Resolve the config file path.
    ///
    /// Priorities 1 and 2 are returned even when the file does not exist, so
    /// that the caller can warn about an explicitly requested but missing file.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ytmp").join("config.toml"))
}
