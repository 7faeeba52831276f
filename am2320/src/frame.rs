use crate::checksum;
use crate::error::CommunicationError;

/// Length of every response frame.
pub const FRAME_LEN: usize = 8;
/// Data bytes between the 2 byte header and the 2 byte checksum.
pub const PAYLOAD_LEN: usize = FRAME_LEN - 4;

/// A response frame whose checksum has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Validates a raw response. A checksum mismatch rejects the whole frame.
    pub fn parse<E: core::fmt::Debug>(
        raw: [u8; FRAME_LEN],
    ) -> Result<Self, CommunicationError<E>> {
        let received = u16::from_le_bytes([raw[FRAME_LEN - 2], raw[FRAME_LEN - 1]]);
        let computed = checksum::compute(&raw[..FRAME_LEN - 2]);
        if computed != received {
            return Err(CommunicationError::Checksum { received, computed });
        }
        Ok(Self(raw))
    }

    /// Function code echoed by the sensor.
    pub fn function(&self) -> u8 {
        self.0[0]
    }

    /// Number of data bytes the sensor claims to have sent.
    pub fn byte_count(&self) -> u8 {
        self.0[1]
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[2..FRAME_LEN - 2]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}
