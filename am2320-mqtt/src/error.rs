use linux_embedded_hal::i2cdev::linux::LinuxI2CError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Error communicating with MQTT broker: {0}")]
    Network(#[from] std::io::Error),
    #[error("Error processing packet: {0}")]
    Mqtt(#[from] mqttrs::Error),
    #[error("Mqtt protocol error: {0}")]
    Protocol(String),
    #[error("Processing timeout")]
    Timeout,
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Environment error: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("I2C bus error: {0}")]
    Bus(#[from] LinuxI2CError),
    #[error("Threading error: {0}")]
    Threading(#[from] tokio::task::JoinError),
}
