use core::fmt::Debug;

/// Failure of a single sensor transaction.
///
/// `E` is the error type of the underlying I2C bus.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError<E: Debug> {
    #[error("bus error: {0:?}")]
    Transport(E),
    /// Both the wake write and the command write failed, usually because
    /// nothing is answering at the address.
    #[error("no response from sensor (wake: {wake:?}, command: {command:?})")]
    NoResponse { wake: E, command: E },
    #[error("checksum error: frame carries {received:#06x}, computed {computed:#06x}")]
    Checksum { received: u16, computed: u16 },
}
