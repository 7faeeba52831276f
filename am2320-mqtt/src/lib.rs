//! Bridge between an AM2320 sensor on a Linux I2C bus and an MQTT broker.
//!
//! Readings are published under the Wiren Board topic layout
//! (`/devices/{id}/controls/{channel}`), with per-channel error flags that are
//! only republished when they change.

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod mqtt;
pub mod publisher;
pub mod telemetry;
pub mod topics;

pub use config::{Config, ConfigError, PollInterval};
pub use controller::{Channel, PollingController, ReadSensor, SessionState};
pub use publisher::{Publication, PublicationQueue, PublishOptions, Publisher, QueuePublisher};
pub use topics::Topics;
