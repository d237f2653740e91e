//! Configuration module for serialmon-rs
//!
//! This module handles application configuration including:
//! - Serial connection parameters handed to the transport
//! - Buffer capacities and value slot counts used by the decoder
//! - Transfer pacing (tick interval, settle delay, default address range)
//! - Auto-run command defaults and log output
//!
//! Command preset files live in [`presets`].
//!
//! # Config Location
//!
//! The default config file is stored in the platform-appropriate location:
//! - **Linux**: `~/.config/serialmon-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/serialmon-rs/config.toml`
//! - **Windows**: `%APPDATA%\serialmon-rs\config.toml`
//!
//! Files ending in `.json` are read and written as JSON, everything else as
//! TOML.
//!
//! # Example
//!
//! ```ignore
//! use serialmon_rs::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default(AppConfig::default_path());
//! config.transfer.tick_interval_ms = 50;
//! config.save("monitor.json")?;
//! ```

pub mod presets;

pub use presets::CommandPresets;

use crate::error::{MonitorError, Result};
use crate::types::{DEFAULT_BUFFER_CAPACITY, DEFAULT_VALUE_SLOTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "serialmon-rs";

/// Config filename inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Default interval between transfer steps in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Default number of ticks to wait for the last read reply
pub const DEFAULT_SETTLE_TICKS: u32 = 5;

/// Default auto-run interval in milliseconds
pub const DEFAULT_AUTO_RUN_INTERVAL_MS: u64 = 1000;

// ==================== Config Directory ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Serial connection parameters
    #[serde(default)]
    pub serial: SerialConfig,

    /// Buffer and value table sizing
    #[serde(default)]
    pub buffers: BufferConfig,

    /// Transfer pacing
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Periodic command defaults
    #[serde(default)]
    pub auto_run: AutoRunConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                MonitorError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                MonitorError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: Option<impl AsRef<Path>>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MonitorError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| MonitorError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| MonitorError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content)
            .map_err(|e| MonitorError::Config(format!("Failed to write config: {}", e)))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

// ==================== Serial Config ====================

/// Serial connection parameters passed to the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    /// Port name (e.g., "COM3" or "/dev/ttyUSB0")
    #[serde(default)]
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Parity
    #[serde(default)]
    pub parity: Parity,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            parity: Parity::default(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Serial parity options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => write!(f, "None"),
            Parity::Odd => write!(f, "Odd"),
            Parity::Even => write!(f, "Even"),
        }
    }
}

// ==================== Buffer Config ====================

/// Buffer capacities and display segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    /// Capacity of the primary (`MB`) buffer
    #[serde(default = "default_capacity")]
    pub primary_capacity: usize,

    /// Capacity of the secondary (`BK`) buffer
    #[serde(default = "default_capacity")]
    pub secondary_capacity: usize,

    /// Number of indexed value slots fed by `PI` records
    #[serde(default = "default_value_slots")]
    pub value_slots: usize,

    /// Maximum number of scaled display segments for either channel
    #[serde(default = "default_display_segments")]
    pub display_segments: usize,

    /// Points per display segment
    #[serde(default = "default_points_per_segment")]
    pub points_per_segment: usize,
}

fn default_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_value_slots() -> usize {
    DEFAULT_VALUE_SLOTS
}

fn default_display_segments() -> usize {
    8
}

fn default_points_per_segment() -> usize {
    512
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            primary_capacity: default_capacity(),
            secondary_capacity: default_capacity(),
            value_slots: default_value_slots(),
            display_segments: default_display_segments(),
            points_per_segment: default_points_per_segment(),
        }
    }
}

// ==================== Transfer Config ====================

/// Pacing and defaults for EEPROM transfers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferConfig {
    /// Interval between transfer steps in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Ticks to wait after the last read command before finalizing
    #[serde(default = "default_settle_ticks")]
    pub settle_ticks: u32,

    /// Default first address of a read
    #[serde(default)]
    pub default_start_address: u32,

    /// Default last address of a read
    #[serde(default = "default_end_address")]
    pub default_end_address: u32,

    /// Default dump filename
    #[serde(default = "default_dump_file")]
    pub dump_file: String,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_settle_ticks() -> u32 {
    DEFAULT_SETTLE_TICKS
}

fn default_end_address() -> u32 {
    1023
}

fn default_dump_file() -> String {
    "eeprom_dump.json".to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            settle_ticks: default_settle_ticks(),
            default_start_address: 0,
            default_end_address: default_end_address(),
            dump_file: default_dump_file(),
        }
    }
}

impl TransferConfig {
    /// Tick interval as a duration, never zero
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

// ==================== Auto Run Config ====================

/// Defaults for the periodic command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoRunConfig {
    /// Command sent each interval
    #[serde(default)]
    pub command: String,

    /// Interval in milliseconds
    #[serde(default = "default_auto_run_interval_ms")]
    pub interval_ms: u64,
}

fn default_auto_run_interval_ms() -> u64 {
    DEFAULT_AUTO_RUN_INTERVAL_MS
}

impl Default for AutoRunConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            interval_ms: default_auto_run_interval_ms(),
        }
    }
}

// ==================== Logging Config ====================

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default)]
    pub filter: Option<String>,
}
