//! # Configuration Management
//!
//! Loads the data-processing configuration from an optional `hygrolog.toml`
//! file, falling back to built-in defaults. Only values the core consumes
//! live here (update interval, UTC flag, output template); transport device
//! selection and verbosity come from the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default output template: date-time, temperature (1 decimal), tab,
/// humidity (1 decimal), tab, newline.
pub const DEFAULT_TEMPLATE: &str = r"%Y-%m-%d %H:%M:%S\t%.1vC\t%.1vH\n";

/// Default aggregation interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid interval value: must be at least 1 second, got {0}")]
    BadInterval(u64),
}

/// Data-processing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation interval in seconds (>= 1).
    pub interval_secs: u64,
    /// Represent the emission time in UTC instead of local time.
    pub utc: bool,
    /// Output template supporting strftime directives plus `%vC`, `%vF`,
    /// `%vH` with printf `%f` modifiers.
    pub template: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval_secs: DEFAULT_INTERVAL_SECS,
            utc: false,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `hygrolog.toml` in the working directory.
    /// Falls back to defaults if the file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from_path("hygrolog.toml")
    }

    /// Load configuration from the specified path.
    /// Falls back to defaults if the file doesn't exist or is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("invalid config file format: {e}; using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Check that the configured values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 1 {
            return Err(ConfigError::BadInterval(self.interval_secs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.interval_secs, 10);
        assert!(!config.utc);
        assert_eq!(config.template, DEFAULT_TEMPLATE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            interval_secs: 60,
            utc: true,
            template: r"%H:%M %vC\n".to_string(),
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.interval_secs, 60);
        assert!(parsed.utc);
        assert_eq!(parsed.template, config.template);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fall back to defaults
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "interval_secs = 30").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Config {
            interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadInterval(0))
        ));
    }
}
