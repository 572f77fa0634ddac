//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::{GcuError, Result};
use crate::telemetry::export::{ExportFormat, LogColumn};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Link reader configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

/// Command sender configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    #[serde(default)]
    pub min_interval_ms: u64,

    #[serde(default = "default_angle_step_deg")]
    pub angle_step_deg: i32,
}

/// Data log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    #[serde(default = "default_export_format")]
    pub format: ExportFormat,

    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Column names to export; empty exports all
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file; console only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 100 }

fn default_idle_backoff_ms() -> u64 { 5 }
fn default_history_len() -> usize { 60 }

fn default_angle_step_deg() -> i32 { 10 }

fn default_export_dir() -> String { "./logs".to_string() }
fn default_export_format() -> ExportFormat { ExportFormat::Csv }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: default_idle_backoff_ms(),
            history_len: default_history_len(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 0,
            angle_step_deg: default_angle_step_deg(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            format: default_export_format(),
            utc_offset_minutes: 0,
            columns: Vec::new(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> GcuError {
    GcuError::Config(toml::de::Error::custom(msg))
}

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
    /// use endurance_gcu::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
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
        // Validate serial port configuration
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        // The poll bound is what keeps stop() responsive
        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        // Validate link reader
        if self.link.idle_backoff_ms > 1000 {
            return Err(invalid("idle_backoff_ms must be between 0 and 1000"));
        }

        if self.link.history_len == 0 || self.link.history_len > 10000 {
            return Err(invalid("history_len must be between 1 and 10000"));
        }

        // Validate commands
        if self.commands.min_interval_ms > 10000 {
            return Err(invalid("min_interval_ms must be between 0 and 10000"));
        }

        if self.commands.angle_step_deg < 1 || self.commands.angle_step_deg > 180 {
            return Err(invalid("angle_step_deg must be between 1 and 180"));
        }

        // Validate data log
        if self.log.export_dir.is_empty() {
            return Err(invalid("log export_dir cannot be empty"));
        }

        if self.log.utc_offset_minutes < -720 || self.log.utc_offset_minutes > 840 {
            return Err(invalid("utc_offset_minutes must be between -720 and 840"));
        }

        for name in &self.log.columns {
            if LogColumn::from_name(name).is_none() {
                return Err(invalid(format!("unknown log column '{}'", name)));
            }
        }

        if let Some(dir) = &self.logging.file_dir {
            if dir.is_empty() {
                return Err(invalid("logging file_dir cannot be empty when set"));
            }
        }

        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.link.idle_backoff_ms)
    }

    pub fn min_command_interval(&self) -> Duration {
        Duration::from_millis(self.commands.min_interval_ms)
    }

    /// Fixed zone for log timestamps
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.log.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Export column selection; empty means all columns
    pub fn export_columns(&self) -> Vec<LogColumn> {
        self.log
            .columns
            .iter()
            .filter_map(|name| LogColumn::from_name(name))
            .collect()
    }
}
