//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The `[setup]` table mirrors the logger's setup dump: named variables such
//! as `station name`, `local time offset` or `GP1 value`. It is handed to the
//! formatter as a [`SetupVariables`] store. The remaining sections configure
//! the command line host.

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::device::gp::gp_index_valid;
use crate::device::SetupVariables;
use crate::error::{FormatterError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logger setup variables, keyed by variable name
    #[serde(default)]
    pub setup: BTreeMap<String, toml::Value>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stderr
    #[serde(default)]
    pub log_dir: String,
}

/// Scheduled transmission configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_interval_secs() -> u64 { 3600 }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest accepted schedule interval (one day)
const MAX_INTERVAL_SECS: u64 = 86_400;

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
    /// use telemetry_formatter::config::Config;
    ///
    /// let config = Config::load("config/station.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing or validation fails
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The `[setup]` table as a variable store
    ///
    /// Scalar values are stringified the way the logger reports them; other
    /// TOML types are rejected by validation and skipped here.
    #[must_use]
    pub fn variables(&self) -> SetupVariables {
        self.setup
            .iter()
            .filter_map(|(name, value)| scalar_text(value).map(|text| (name, text)))
            .collect()
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate logging configuration
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(FormatterError::Config(toml::de::Error::custom(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            ))));
        }

        // Validate schedule
        if self.schedule.interval_secs == 0 || self.schedule.interval_secs > MAX_INTERVAL_SECS {
            return Err(FormatterError::Config(toml::de::Error::custom(
                "interval_secs must be between 1 and 86400",
            )));
        }

        // Validate setup variables
        for (name, value) in &self.setup {
            if name.trim().is_empty() {
                return Err(FormatterError::Config(toml::de::Error::custom(
                    "setup variable names cannot be empty",
                )));
            }

            if scalar_text(value).is_none() {
                return Err(FormatterError::Config(toml::de::Error::custom(format!(
                    "setup variable {:?} must be a string, number or boolean",
                    name
                ))));
            }

            if !gp_key_valid(name) {
                return Err(FormatterError::Config(toml::de::Error::custom(format!(
                    "setup variable {:?} must name GP1-GP32 label or value",
                    name
                ))));
            }
        }

        Ok(())
    }
}

/// Text of a scalar TOML value
fn scalar_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(if *b { "On" } else { "Off" }.to_string()),
        _ => None,
    }
}

/// Returns false for a `GP...` key that does not name a real slot field
///
/// Keys that do not start with `GP` are not checked.
fn gp_key_valid(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    let Some(rest) = lower.strip_prefix("gp") else {
        return true;
    };

    let mut parts = rest.split_whitespace();
    let index = parts.next().and_then(|n| n.parse::<usize>().ok());
    let field = parts.next();

    match (index, field, parts.next()) {
        (Some(index), Some("label" | "value"), None) => gp_index_valid(index),
        _ => false,
    }
}
