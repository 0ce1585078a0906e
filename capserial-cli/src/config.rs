//! Configuration file support for capserial.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (CAPSERIAL_*)
//! 3. Local config file (./capserial.toml)
//! 4. Global config file (~/.config/capserial/config.toml)
//!
//! ```toml
//! [connection]
//! device = "/dev/ttyACM0"
//! baud = 115200
//! data_bits = 8
//! parity = "none"
//! stop_bits = 1
//! flow_control = "none"
//!
//! [poll]
//! rate_hz = 25
//! reconnect_ms = 1000
//! ```

use capserial::{DataBits, FlowControl, LineConfig, Parity, StopBits};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Device to use instead of the first discovered one.
    pub device: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Data bits (5-8).
    pub data_bits: Option<DataBits>,
    /// Parity ("none", "odd", "even").
    pub parity: Option<Parity>,
    /// Stop bits (1 or 2).
    pub stop_bits: Option<StopBits>,
    /// Flow control ("none", "hardware", "software").
    pub flow_control: Option<FlowControl>,
}

/// Polling loop settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollConfig {
    /// Polls per second.
    pub rate_hz: Option<u32>,
    /// Minimum delay between reconnect attempts, in milliseconds.
    pub reconnect_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Poll loop configuration.
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Poll rate matching the display refresh of the original demos.
    pub const DEFAULT_RATE_HZ: u32 = 25;

    /// Default delay between reconnect attempts.
    pub const DEFAULT_RECONNECT: Duration = Duration::from_secs(1);

    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("capserial.toml")) {
            debug!("Loaded local config from capserial.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .map_err(|e| warn!("Failed to parse config file {}: {}", path.display(), e))
                .ok(),
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "capserial").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one. Values set in `other` win.
    fn merge(&mut self, other: Self) {
        let conn = other.connection;
        if conn.device.is_some() {
            self.connection.device = conn.device;
        }
        if conn.baud.is_some() {
            self.connection.baud = conn.baud;
        }
        if conn.data_bits.is_some() {
            self.connection.data_bits = conn.data_bits;
        }
        if conn.parity.is_some() {
            self.connection.parity = conn.parity;
        }
        if conn.stop_bits.is_some() {
            self.connection.stop_bits = conn.stop_bits;
        }
        if conn.flow_control.is_some() {
            self.connection.flow_control = conn.flow_control;
        }

        if other.poll.rate_hz.is_some() {
            self.poll.rate_hz = other.poll.rate_hz;
        }
        if other.poll.reconnect_ms.is_some() {
            self.poll.reconnect_ms = other.poll.reconnect_ms;
        }
    }

    /// Line discipline from the file, with an optional baud rate override.
    pub fn line_config(&self, baud_override: Option<u32>) -> LineConfig {
        let defaults = LineConfig::default();
        let conn = &self.connection;
        LineConfig {
            baud_rate: baud_override
                .or(conn.baud)
                .unwrap_or(defaults.baud_rate),
            data_bits: conn.data_bits.unwrap_or(defaults.data_bits),
            parity: conn.parity.unwrap_or(defaults.parity),
            stop_bits: conn.stop_bits.unwrap_or(defaults.stop_bits),
            flow_control: conn.flow_control.unwrap_or(defaults.flow_control),
        }
    }

    /// Time between polls, with an optional rate override. Zero rates fall back
    /// to the default.
    pub fn poll_period(&self, rate_override: Option<u32>) -> Duration {
        let rate = rate_override
            .or(self.poll.rate_hz)
            .filter(|&hz| hz > 0)
            .unwrap_or(Self::DEFAULT_RATE_HZ);
        Duration::from_secs(1) / rate
    }

    /// Minimum delay between reconnect attempts.
    pub fn reconnect_interval(&self) -> Duration {
        self.poll
            .reconnect_ms
            .map_or(Self::DEFAULT_RECONNECT, Duration::from_millis)
    }
}
