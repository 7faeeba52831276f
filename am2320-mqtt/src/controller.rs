use std::collections::HashMap;
use std::fmt;

use am2320::{Am2320, CommunicationError, Reading};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PollInterval};
use crate::publisher::{PublishOptions, Publisher};
use crate::topics::Topics;

/// Error code published on both channels when a read fails.
pub const READ_ERROR: &str = "r";

/// Granularity of the interval sleep, bounds how late a shutdown is noticed.
const SLEEP_SLICE_MS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Humidity,
}

impl Channel {
    /// Publication order within a cycle.
    pub const ALL: [Channel; 2] = [Channel::Temperature, Channel::Humidity];

    /// Control id used in topics.
    pub fn id(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
        }
    }

    /// Control type announced in `meta/type`.
    pub fn kind(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "rel_humidity",
        }
    }

    pub fn value(self, reading: &Reading) -> f32 {
        match self {
            Channel::Temperature => reading.temperature,
            Channel::Humidity => reading.humidity,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Anything the controller can take a reading from.
pub trait ReadSensor {
    type Error: fmt::Display;

    fn read(&mut self) -> Result<Reading, Self::Error>;
}

impl<I2C, D> ReadSensor for Am2320<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = CommunicationError<I2C::Error>;

    fn read(&mut self) -> Result<Reading, Self::Error> {
        Am2320::read(self)
    }
}

/// What the controller remembers between cycles.
#[derive(Debug, Default)]
pub struct SessionState {
    last_reading: Option<Reading>,
    errors: HashMap<Channel, String>,
    consecutive_failures: u32,
}

impl SessionState {
    /// Last successful reading, `None` until the first one.
    pub fn last_reading(&self) -> Option<Reading> {
        self.last_reading
    }

    /// Failed reads since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Last published error code of `channel`, empty when healthy.
    pub fn error(&self, channel: Channel) -> &str {
        self.errors.get(&channel).map(String::as_str).unwrap_or("")
    }

    /// Stores `code` and reports whether it differs from the previous one.
    fn swap_error(&mut self, channel: Channel, code: &str) -> bool {
        if self.error(channel) == code {
            return false;
        }
        self.errors.insert(channel, code.to_owned());
        true
    }
}

/// Polls the sensor forever and publishes results.
///
/// Error flags are debounced: a channel's error topic is written only when
/// its code changes, so a sensor that stays unplugged produces one error
/// publication rather than one per cycle.
pub struct PollingController<S, P, D> {
    sensor: S,
    publisher: P,
    delay: D,
    topics: Topics,
    poll_interval: PollInterval,
    decimal_places: usize,
    state: SessionState,
}

impl<S, P, D> PollingController<S, P, D>
where
    S: ReadSensor,
    P: Publisher,
    D: DelayNs,
{
    /// Fails without touching the sensor when the interval is below the minimum.
    pub fn new(
        sensor: S,
        publisher: P,
        delay: D,
        topics: Topics,
        poll_interval_secs: u64,
    ) -> Result<Self, ConfigError> {
        let poll_interval = PollInterval::from_secs(poll_interval_secs)?;
        Ok(Self {
            sensor,
            publisher,
            delay,
            topics,
            poll_interval,
            decimal_places: 1,
            state: SessionState::default(),
        })
    }

    pub fn with_decimal_places(mut self, decimal_places: usize) -> Self {
        self.decimal_places = decimal_places;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Runs one read/publish cycle.
    ///
    /// A failed read has already been published as an error flag when this
    /// returns `Err`.
    pub fn poll_once(&mut self) -> Result<Reading, S::Error> {
        match self.sensor.read() {
            Ok(reading) => {
                debug!(%reading, "Sensor read");
                if self.state.consecutive_failures > 0 {
                    info!(
                        failures = self.state.consecutive_failures,
                        "Sensor recovered"
                    );
                }
                self.state.consecutive_failures = 0;
                self.state.last_reading = Some(reading);
                for channel in Channel::ALL {
                    self.publish_channel(channel, channel.value(&reading));
                }
                Ok(reading)
            }
            Err(e) => {
                self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
                warn!(
                    error = %e,
                    failures = self.state.consecutive_failures,
                    "Sensor read failed"
                );
                for channel in Channel::ALL {
                    self.set_channel_error(channel, READ_ERROR);
                }
                Err(e)
            }
        }
    }

    /// Publishes `code` on the channel's error topic if it changed.
    pub fn set_channel_error(&mut self, channel: Channel, code: &str) {
        if self.state.swap_error(channel, code) {
            debug!(%channel, code, "Error state changed");
            self.publisher.publish(
                &self.topics.control_error(channel),
                code,
                PublishOptions::RETAINED,
            );
        }
    }

    /// Clears any error on the channel, then publishes the value.
    pub fn publish_channel(&mut self, channel: Channel, value: f32) {
        self.set_channel_error(channel, "");
        let payload = format!("{value:.prec$}", prec = self.decimal_places);
        self.publisher.publish(
            &self.topics.control(channel),
            &payload,
            PublishOptions::RETAINED,
        );
    }

    /// Polls until `cancel` fires. Blocks the calling thread.
    pub fn run(&mut self, cancel: &CancellationToken) {
        info!(
            device = self.topics.device_id(),
            interval = ?self.poll_interval.as_duration(),
            "Polling started"
        );
        while !cancel.is_cancelled() {
            if self.poll_once().is_err() {
                debug!(
                    failures = self.state.consecutive_failures(),
                    "Retrying after the poll interval"
                );
            }
            self.sleep(cancel);
        }
        info!("Polling stopped");
    }

    fn sleep(&mut self, cancel: &CancellationToken) {
        let mut remaining = self.poll_interval.as_duration().as_millis();
        while remaining > 0 && !cancel.is_cancelled() {
            let slice = remaining.min(u128::from(SLEEP_SLICE_MS)) as u32;
            self.delay.delay_ms(slice);
            remaining -= u128::from(slice);
        }
    }
}
