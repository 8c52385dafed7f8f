//! ytmp-ap specific configuration
//!
//! Merges the optional TOML file with command-line overrides and validates
//! the result. CLI values win over file values; compiled defaults fill the
//! rest.

use crate::error::{Error, Result};
use crate::playback::CoordinatorConfig;
use std::path::PathBuf;
use std::time::Duration;
use ytmp_common::config::TomlConfig;

pub const DEFAULT_TARGET_LUFS: f64 = -14.0;
pub const DEFAULT_VOLUME: f64 = 1.0;
/// ~60 Hz display refresh
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;
pub const DEFAULT_WAVEFORM_BAR_WIDTH_PX: u32 = 3;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Where track bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum ByteSourceConfig {
    Http { base_url: String },
    Folder { path: PathBuf },
}

/// Values supplied on the command line (all optional)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub target_lufs: Option<f64>,
    pub volume: Option<f64>,
    pub audio_base_url: Option<String>,
    pub music_folder: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Validated player configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub target_lufs: f64,
    pub volume: f64,
    pub tick_interval: Duration,
    pub waveform_bar_width_px: u32,
    pub event_capacity: usize,
    pub byte_source: Option<ByteSourceConfig>,
    pub log_level: String,
}

impl PlayerConfig {
    /// Merge file values with CLI overrides and validate.
    ///
    /// A music folder takes precedence over an HTTP base URL when both are set.
    ///
    /// # Errors
    /// `Error::Config` naming the first invalid setting.
    pub fn resolve(file: &TomlConfig, cli: &CliOverrides) -> Result<Self> {
        let target_lufs = cli
            .target_lufs
            .or(file.target_lufs)
            .unwrap_or(DEFAULT_TARGET_LUFS);
        if !target_lufs.is_finite() {
            return Err(Error::Config(format!("target_lufs must be finite, got {}", target_lufs)));
        }

        let volume = cli.volume.or(file.volume).unwrap_or(DEFAULT_VOLUME);
        if !volume.is_finite() || volume <= 0.0 {
            return Err(Error::Config(format!("volume must be > 0, got {}", volume)));
        }

        let tick_ms = file.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        if !(1..=1000).contains(&tick_ms) {
            return Err(Error::Config(format!(
                "tick_interval_ms must be 1..=1000, got {}",
                tick_ms
            )));
        }

        let waveform_bar_width_px = file
            .waveform_bar_width_px
            .unwrap_or(DEFAULT_WAVEFORM_BAR_WIDTH_PX);
        if waveform_bar_width_px == 0 {
            return Err(Error::Config("waveform_bar_width_px must be >= 1".to_string()));
        }

        let event_capacity = file.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be >= 1".to_string()));
        }

        let folder = cli.music_folder.clone().or_else(|| file.music_folder.clone());
        let base_url = cli
            .audio_base_url
            .clone()
            .or_else(|| file.audio_base_url.clone())
            .filter(|url| !url.trim().is_empty());
        let byte_source = match (folder, base_url) {
            (Some(path), _) => Some(ByteSourceConfig::Folder { path }),
            (None, Some(base_url)) => Some(ByteSourceConfig::Http { base_url }),
            (None, None) => None,
        };

        let log_level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| file.logging.level.clone());

        Ok(Self {
            target_lufs,
            volume,
            tick_interval: Duration::from_millis(tick_ms),
            waveform_bar_width_px,
            event_capacity,
            byte_source,
            log_level,
        })
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            target_lufs: self.target_lufs,
            tick_interval: self.tick_interval,
            waveform_bar_width_px: self.waveform_bar_width_px,
            ..CoordinatorConfig::default()
        }
    }
}
