use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Shortest poll interval the sensor tolerates between transactions.
pub const MIN_POLL_INTERVAL_SECS: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("poll interval cannot be smaller than {min} seconds, got {got}")]
    PollIntervalTooShort { got: u64, min: u64 },
}

/// Daemon configuration, read from a JSON file. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Device id used in MQTT topics and as the MQTT client id.
    #[serde(default = "default_mqtt_id")]
    pub mqtt_id: String,
    /// Human readable device name announced at startup.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub debug: bool,
    /// Number N of the `/dev/i2c-N` bus the sensor is attached to.
    #[serde(default)]
    pub i2c_bus: u32,
    /// Seconds between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: usize,
}

fn default_mqtt_id() -> String {
    "am2320".to_string()
}

fn default_name() -> String {
    "AM232x sensor".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_decimal_places() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt_id: default_mqtt_id(),
            name: default_name(),
            debug: false,
            i2c_bus: 0,
            poll_interval: default_poll_interval(),
            decimal_places: default_decimal_places(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parses and validates a configuration document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.poll_interval()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Result<PollInterval, ConfigError> {
        PollInterval::from_secs(self.poll_interval)
    }

    pub fn i2c_device(&self) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", self.i2c_bus))
    }
}

/// A poll interval known to respect [`MIN_POLL_INTERVAL_SECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(Duration);

impl PollInterval {
    pub fn from_secs(secs: u64) -> Result<Self, ConfigError> {
        if secs < MIN_POLL_INTERVAL_SECS {
            return Err(ConfigError::PollIntervalTooShort {
                got: secs,
                min: MIN_POLL_INTERVAL_SECS,
            });
        }
        Ok(Self(Duration::from_secs(secs)))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }
}
