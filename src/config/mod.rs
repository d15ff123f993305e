//! Configuration module for modal-rs
//!
//! This module handles application configuration including:
//! - Analysis parameters (padding factor, spectrum mode, detection tolerance)
//! - Auto-recording parameters (hit threshold, delay, duration)
//! - Mode grouping parameters (tolerance, source filter, ordering)
//!
//! # Data Location
//!
//! The configuration file and cached recordings live in the
//! platform-appropriate data directory under `dev.modal-rs`:
//!
//! - **Linux**: `~/.local/share/dev.modal-rs/`
//! - **macOS**: `~/Library/Application Support/dev.modal-rs/`
//! - **Windows**: `%APPDATA%\dev.modal-rs\`
//!
//! # Files
//!
//! - `config.json` - User-chosen parameters (a `.toml` file works too)
//! - `Cached_Samples/` - Recordings exported at the end of each session
//!
//! A missing or unreadable configuration never stops the program: the
//! loader logs the problem and falls back to the documented defaults.

pub mod settings;

pub use settings::*;

use crate::error::{ModalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.modal-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.json";

/// Directory (under the data dir) receiving session recordings
pub const CACHED_SAMPLES_DIR: &str = "Cached_Samples";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure a directory exists, creating it if needed
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            ModalError::Config(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }
    Ok(())
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spectral analysis parameters
    pub analysis: AnalysisSettings,
    /// Auto-recording parameters
    pub recording: RecordingSettings,
    /// Mode grouping parameters
    pub aggregation: AggregationSettings,
    /// Where recordings and analysis results are written
    pub output_dir: Option<PathBuf>,
}

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load a config file (JSON or TOML by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModalError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: AppConfig = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| {
                ModalError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| {
                ModalError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
        };

        config.validate()
    }

    /// Load a config file, returning defaults on any error
    ///
    /// With no explicit path the default location is used; a file that does
    /// not exist there is not an error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::info!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Save the config (JSON or TOML by extension)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ModalError::Config(format!("Failed to serialize config: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| ModalError::Config(format!("Failed to serialize config: {}", e)))?,
        };

        std::fs::write(path, content).map_err(|e| {
            ModalError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check parameter ranges, clamping the ones with an obvious fix
    pub fn validate(mut self) -> Result<Self> {
        let padding = self.analysis.padding_factor;
        self.analysis.padding_factor = padding.clamp(1, MAX_PADDING_FACTOR);
        if self.analysis.padding_factor != padding {
            tracing::warn!(
                "padding_factor {} is out of range, using {}",
                padding,
                self.analysis.padding_factor
            );
        }
        if self.analysis.max_samples == Some(0) {
            self.analysis.max_samples = None;
        }
        let tolerance = self.aggregation.tolerance_hz;
        self.aggregation = self.aggregation.with_tolerance(tolerance)?;
        if !(self.analysis.normalization_ceiling > 0.0) {
            return Err(ModalError::Config(format!(
                "analysis.normalization_ceiling must be positive, got {}",
                self.analysis.normalization_ceiling
            )));
        }
        if !self.recording.hit_threshold.is_finite() {
            return Err(ModalError::Config(
                "recording.hit_threshold must be finite".to_string(),
            ));
        }
        Ok(self)
    }

    /// Directory for session recordings
    pub fn samples_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => app_data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(CACHED_SAMPLES_DIR),
        }
    }
}
