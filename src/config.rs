//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{AgtError, Result};
use crate::sbd::protocol::{MIN_MESSAGE_LEN, MO_TEXT_LIMIT, MT_MESSAGE_LIMIT};

/// Main configuration structure
///
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily rolling log file; empty logs to stderr only
    #[serde(default)]
    pub directory: String,
}

/// Decoded-message log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Transport size limits used for advisories
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Mobile Originated text message limit in bytes
    #[serde(default = "default_mo_text_limit")]
    pub mo_text_limit: usize,

    /// Mobile Terminated message limit in bytes
    #[serde(default = "default_mt_message_limit")]
    pub mt_message_limit: usize,
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_mo_text_limit() -> usize { MO_TEXT_LIMIT }
fn default_mt_message_limit() -> usize { MT_MESSAGE_LIMIT }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mo_text_limit: default_mo_text_limit(),
            mt_message_limit: default_mt_message_limit(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use agt_codec::config::Config;
    ///
    /// let config = Config::load("agt-codec.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(AgtError::Config(toml::de::Error::custom(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            ))));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(AgtError::Config(
                toml::de::Error::custom("telemetry log_dir cannot be empty when enabled")
            ));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(AgtError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0")
            ));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(AgtError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0")
            ));
        }

        if self.telemetry.format != "jsonl" {
            return Err(AgtError::Config(
                toml::de::Error::custom("log format must be 'jsonl' (only supported format)")
            ));
        }

        if self.limits.mo_text_limit == 0 {
            return Err(AgtError::Config(
                toml::de::Error::custom("mo_text_limit must be greater than 0")
            ));
        }

        if self.limits.mt_message_limit < MIN_MESSAGE_LEN {
            return Err(AgtError::Config(toml::de::Error::custom(format!(
                "mt_message_limit must be at least {}",
                MIN_MESSAGE_LEN
            ))));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_empty());
        assert_eq!(config.telemetry.max_records_per_file, 10000);
        assert_eq!(config.limits.mo_text_limit, 340);
        assert_eq!(config.limits.mt_message_limit, 270);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.log_dir, "./logs");
        assert_eq!(config.telemetry.format, "jsonl");
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[logging]
level = "debug"

[telemetry]
log_dir = "/tmp/agt"
max_files_to_keep = 3

[limits]
mt_message_limit = 300
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.telemetry.log_dir, "/tmp/agt");
        assert_eq!(config.telemetry.max_files_to_keep, 3);
        assert_eq!(config.telemetry.max_records_per_file, 10000);
        assert_eq!(config.limits.mt_message_limit, 300);
        assert_eq!(config.limits.mo_text_limit, 340);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/agt-codec.toml");
        assert!(matches!(result, Err(AgtError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = Config::from_toml("[logging\nlevel = ");
        assert!(matches!(result, Err(AgtError::Config(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = create_valid_config();
        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = create_valid_config();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mo_text_limit_zero() {
        let mut config = create_valid_config();
        config.limits.mo_text_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mt_message_limit_below_framing() {
        let mut config = create_valid_config();
        config.limits.mt_message_limit = 3;
        assert!(config.validate().is_err());

        config.limits.mt_message_limit = 4;
        assert!(config.validate().is_ok());
    }
}
