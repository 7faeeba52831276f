//! CRC-16 used by the AM2320 response frames.
//!
//! The datasheet describes the algorithm bitwise: start from `0xFFFF`, XOR
//! every byte into the low half, then shift right eight times, XOR-ing in
//! `0xA001` whenever the dropped bit was set. That is CRC-16/MODBUS.

use crc::{CRC_16_MODBUS, Crc};

const CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Computes the checksum over `bytes`.
#[inline]
pub fn compute(bytes: &[u8]) -> u16 {
    CRC_COMPUTER.checksum(bytes)
}

/// Splits a frame into its covered bytes and the little-endian checksum it carries.
///
/// Returns `None` for frames too short to carry a checksum.
pub fn split(frame: &[u8]) -> Option<(&[u8], u16)> {
    if frame.len() < 2 {
        return None;
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    Some((body, u16::from_le_bytes([tail[0], tail[1]])))
}

/// Checks the trailing two bytes of `frame` against the checksum of the rest.
pub fn verify(frame: &[u8]) -> bool {
    match split(frame) {
        Some((body, received)) => compute(body) == received,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bitwise form from the datasheet, kept to pin the catalogue algorithm.
    fn reference(bytes: &[u8]) -> u16 {
        let mut crc = 0xFFFFu16;
        for byte in bytes {
            crc ^= u16::from(*byte);
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn check_value() {
        assert_eq!(compute(b"123456789"), 0x4B37);
    }

    #[test]
    fn matches_bitwise_definition() {
        let inputs: [&[u8]; 4] = [
            &[],
            &[0x03, 0x04, 0x01, 0xF4, 0x00, 0xFA],
            &[0x03, 0x04, 0x00, 0x00, 0x00, 0x01],
            &[0xFF; 32],
        ];
        for input in inputs {
            assert_eq!(compute(input), reference(input), "input {input:02x?}");
        }
    }

    #[test]
    fn compute_is_deterministic() {
        let bytes = [0x03, 0x04, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(compute(&bytes), compute(&bytes));
        assert_eq!(compute(&bytes), 0xDC8A);
    }

    #[test]
    fn datasheet_frame_verifies() {
        // 50.0 %RH, 25.0 C
        let frame = [0x03, 0x04, 0x01, 0xF4, 0x00, 0xFA, 0x31, 0xA5];
        assert!(verify(&frame));
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut frame = [0x03, 0x04, 0x01, 0xF4, 0x00, 0xFA, 0x31, 0xA5];
        frame[7] ^= 0x01;
        assert!(!verify(&frame));
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let frame = [0x03, 0x04, 0x01, 0xF5, 0x00, 0xFA, 0x31, 0xA5];
        assert!(!verify(&frame));
    }

    #[test]
    fn short_input_never_verifies() {
        assert!(!verify(&[]));
        assert!(!verify(&[0xFF]));
        // Empty body checksums to the initial value.
        assert!(verify(&[0xFF, 0xFF]));
    }
}
