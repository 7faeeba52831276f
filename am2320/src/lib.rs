#![cfg_attr(not(test), no_std)]
//! Driver for the Aosong AM2320 temperature and humidity sensor.
//!
//! The AM2320 speaks a Modbus-like protocol on top of I2C. Every exchange is
//! a wake write, a read-registers command, a 2 ms turnaround and an 8 byte
//! response frame closed by a CRC-16:
//!
//! ```text
//! +------+-------+---------+---------+---------+---------+--------+--------+
//! | 0x03 | count | data[0] | data[1] | data[2] | data[3] | crc lo | crc hi |
//! +------+-------+---------+---------+---------+---------+--------+--------+
//! ```
//!
//! The driver is generic over the `embedded-hal` 1.0 [`I2c`](embedded_hal::i2c::I2c)
//! and [`DelayNs`](embedded_hal::delay::DelayNs) traits and never retries on
//! its own. Retry policy belongs to the caller.

pub mod checksum;
pub mod decode;
mod device;
mod error;
mod frame;

pub use device::{Am2320, Command, DEFAULT_ADDRESS, SETTLE_DELAY_US, register};
pub use error::CommunicationError;
pub use frame::{FRAME_LEN, Frame, PAYLOAD_LEN};

/// A single decoded measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "temperature: {:.1}, humidity: {:.1}",
            self.temperature, self.humidity
        )
    }
}
