//! Configuration management for Keystroke Heatmap
//!
//! Provides persistent configuration loaded from a platform-specific config
//! file. Every section is optional; missing values fall back to defaults.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/keystroke-heatmap/config.toml` |
//! | macOS | `~/Library/Application Support/keystroke-heatmap/config.toml` |
//! | Windows | `%APPDATA%\keystroke-heatmap\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use keystroke_heatmap::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Modify settings
//! config.recording.status_interval_secs = 60;
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use crate::heatmap::Metric;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "keystroke-heatmap";

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to determine config directory
    NoConfigDir,
    /// Failed to determine data directory for snapshots
    NoDataDir,
    /// IO error reading or writing config file
    Io(io::Error),
    /// Failed to parse config file
    Parse(toml::de::Error),
    /// Failed to serialize config
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine config directory"),
            ConfigError::NoDataDir => write!(f, "Could not determine data directory"),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join(APP_DIR);

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Default snapshot directory: `<data dir>/keystroke-heatmap/snapshots`.
///
/// The directory itself is created lazily by the first save.
pub fn default_snapshot_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(data_dir.join(APP_DIR).join("snapshots"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Recording session settings
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Heatmap display settings
    #[serde(default)]
    pub heatmap: HeatmapConfig,
}

/// Input backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Evdev on Linux when accessible, polling otherwise
    #[default]
    Auto,
    /// Raw evdev devices (Linux only)
    Evdev,
    /// device_query state polling
    Poll,
}

/// Recording session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Where snapshots are written (platform data dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Sleep between listener polls, in milliseconds
    pub poll_interval_ms: u64,
    /// How often the running totals are logged, in seconds (0 = never)
    pub status_interval_secs: u64,
    /// Which input backend to use
    pub backend: Backend,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            poll_interval_ms: 5,
            status_interval_secs: 30,
            backend: Backend::Auto,
        }
    }
}

/// Heatmap display configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Statistic used for coloring
    pub metric: Metric,
    /// Print hex colors instead of a colored keyboard
    pub show_hex: bool,
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Listener poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.recording.poll_interval_ms.max(1))
    }

    /// Status log interval, `None` when disabled
    pub fn status_interval(&self) -> Option<Duration> {
        match self.recording.status_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Configured snapshot directory or the platform default
    pub fn snapshot_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.recording.snapshot_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_snapshot_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path() -> PathBuf {
        env::temp_dir().join(format!("keystroke-heatmap-test-{}.toml", std::process::id()))
    }

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.recording.poll_interval_ms, 5);
        assert_eq!(config.recording.status_interval_secs, 30);
        assert_eq!(config.recording.backend, Backend::Auto);
        assert!(config.recording.snapshot_dir.is_none());
        assert_eq!(config.heatmap.metric, Metric::Presses);
        assert!(!config.heatmap.show_hex);
    }

    #[test]
    fn config_intervals() {
        let mut config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(5));
        assert_eq!(config.status_interval(), Some(Duration::from_secs(30)));

        config.recording.poll_interval_ms = 0;
        config.recording.status_interval_secs = 0;
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.status_interval(), None);
    }

    #[test]
    fn config_save_and_load_roundtrip() {
        let path = temp_config_path();

        let mut config = Config::default();
        config.recording.snapshot_dir = Some(PathBuf::from("/tmp/heatmaps"));
        config.recording.backend = Backend::Poll;
        config.heatmap.metric = Metric::HeldTime;

        config.save_to(&path).expect("Failed to save config");
        let loaded = Config::load_from(&path).expect("Failed to load config");

        assert_eq!(loaded.recording.snapshot_dir, Some(PathBuf::from("/tmp/heatmaps")));
        assert_eq!(loaded.recording.backend, Backend::Poll);
        assert_eq!(loaded.heatmap.metric, Metric::HeldTime);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("[recording]"));
        assert!(toml_str.contains("[heatmap]"));
        assert!(toml_str.contains("poll_interval_ms = 5"));
        assert!(toml_str.contains("metric = \"Presses\""));
        assert!(!toml_str.contains("snapshot_dir"));
    }

    #[test]
    fn config_deserializes_partial_toml() {
        let toml_str = r#"
[recording]
snapshot_dir = "/data/keys"
backend = "Evdev"

[heatmap]
metric = "HeldTime"

[future_section]
anything = true
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");

        assert_eq!(config.recording.snapshot_dir, Some(PathBuf::from("/data/keys")));
        assert_eq!(config.recording.backend, Backend::Evdev);
        assert_eq!(config.recording.poll_interval_ms, 5);
        assert_eq!(config.heatmap.metric, Metric::HeldTime);
        assert_eq!(config.snapshot_dir().expect("dir"), PathBuf::from("/data/keys"));
    }

    #[test]
    fn config_empty_toml_is_default() {
        let config: Config = toml::from_str("").expect("Failed to deserialize");
        assert_eq!(config.recording.status_interval_secs, 30);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::NoConfigDir;
        assert_eq!(err.to_string(), "Could not determine config directory");

        let io_err = ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO error"));
    }
}
