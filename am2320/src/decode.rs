//! Conversion of validated frame payloads into values.
//!
//! Both decoders expect the 4 byte payload of a checksummed frame. Any other
//! length means the protocol layer handed over something it should not have,
//! so they panic instead of guessing.

use crate::Reading;
use crate::frame::PAYLOAD_LEN;

/// Decodes `[hum msb, hum lsb, temp msb, temp lsb]`.
///
/// Temperature is read as a plain unsigned value. The sign-bit convention of
/// some datasheet revisions is not applied.
pub fn decode_reading(payload: &[u8]) -> Reading {
    assert_eq!(
        payload.len(),
        PAYLOAD_LEN,
        "measurement payload must be {PAYLOAD_LEN} bytes"
    );
    let humidity = u16::from_be_bytes([payload[0], payload[1]]);
    let temperature = u16::from_be_bytes([payload[2], payload[3]]);
    Reading {
        temperature: f32::from(temperature) / 10.0,
        humidity: f32::from(humidity) / 10.0,
    }
}

/// Decodes the 32-bit device identifier, most significant byte first.
pub fn decode_uid(payload: &[u8]) -> u32 {
    assert_eq!(
        payload.len(),
        PAYLOAD_LEN,
        "device id payload must be {PAYLOAD_LEN} bytes"
    );
    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
}
