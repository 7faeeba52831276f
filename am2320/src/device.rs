use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::Reading;
use crate::decode::{decode_reading, decode_uid};
use crate::error::CommunicationError;
use crate::frame::{FRAME_LEN, Frame, PAYLOAD_LEN};

/// 7-bit I2C address (0xB8 >> 1).
pub const DEFAULT_ADDRESS: u8 = 0x5C;

/// Turnaround between the command write and the response read.
pub const SETTLE_DELAY_US: u32 = 2_000;

/// Byte written to bring the sensor out of sleep. The sensor usually NACKs it.
const WAKE_BYTE: u8 = 0x00;

/// Register map, datasheet section 7.
pub mod register {
    pub const HUMIDITY_MSB: u8 = 0x00;
    pub const HUMIDITY_LSB: u8 = 0x01;
    pub const TEMPERATURE_MSB: u8 = 0x02;
    pub const TEMPERATURE_LSB: u8 = 0x03;
    pub const DEVICE_ID_BIT_24_31: u8 = 0x0B;
}

/// Function codes understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReadRegisters = 0x03,
}

pub struct Am2320<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D> Am2320<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Runs one wake/command/settle/read exchange and validates the response.
    ///
    /// A failed wake write is ignored unless the command write fails as well,
    /// in which case both errors are returned.
    pub fn transact(
        &mut self,
        command: Command,
        register_address: u8,
        register_count: u8,
    ) -> Result<Frame, CommunicationError<I2C::Error>> {
        let wake = self.i2c.write(self.address, &[WAKE_BYTE]);

        if let Err(command_err) = self.i2c.write(
            self.address,
            &[command as u8, register_address, register_count],
        ) {
            return Err(match wake {
                Err(wake_err) => CommunicationError::NoResponse {
                    wake: wake_err,
                    command: command_err,
                },
                Ok(()) => CommunicationError::Transport(command_err),
            });
        }

        self.delay.delay_us(SETTLE_DELAY_US);

        let mut raw = [0u8; FRAME_LEN];
        self.i2c
            .read(self.address, &mut raw)
            .map_err(CommunicationError::Transport)?;

        Frame::parse(raw)
    }

    /// Reads temperature and humidity in a single transaction.
    pub fn read(&mut self) -> Result<Reading, CommunicationError<I2C::Error>> {
        let frame = self.transact(
            Command::ReadRegisters,
            register::HUMIDITY_MSB,
            PAYLOAD_LEN as u8,
        )?;
        Ok(decode_reading(frame.payload()))
    }

    /// Reads the unique 32-bit sensor id.
    pub fn read_uid(&mut self) -> Result<u32, CommunicationError<I2C::Error>> {
        let frame = self.transact(
            Command::ReadRegisters,
            register::DEVICE_ID_BIT_24_31,
            PAYLOAD_LEN as u8,
        )?;
        Ok(decode_uid(frame.payload()))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives the bus and delay back.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    fn exchange(register: u8, response: [u8; FRAME_LEN]) -> Vec<Transaction> {
        vec![
            Transaction::write(DEFAULT_ADDRESS, vec![0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, register, 0x04]),
            Transaction::read(DEFAULT_ADDRESS, response.to_vec()),
        ]
    }

    #[test]
    fn read_runs_full_exchange() {
        let expectations = exchange(
            register::HUMIDITY_MSB,
            [0x03, 0x04, 0x01, 0x2C, 0x00, 0xC8, 0x30, 0x4B],
        );
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        let reading = sensor.read().unwrap();
        assert_eq!(reading.temperature, 20.0);
        assert_eq!(reading.humidity, 30.0);

        let (_, delay) = sensor.release();
        assert_eq!(delay.total_ns, u64::from(SETTLE_DELAY_US) * 1_000);
        i2c.done();
    }

    #[test]
    fn read_uid_uses_device_id_register() {
        let expectations = exchange(
            register::DEVICE_ID_BIT_24_31,
            [0x03, 0x04, 0x00, 0x00, 0x00, 0x01, 0x30, 0x28],
        );
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        assert_eq!(sensor.read_uid().unwrap(), 1);
        i2c.done();
    }

    #[test]
    fn nacked_wake_is_tolerated() {
        let expectations = vec![
            Transaction::write(DEFAULT_ADDRESS, vec![0x00]).with_error(ErrorKind::Other),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, 0x00, 0x04]),
            Transaction::read(
                DEFAULT_ADDRESS,
                vec![0x03, 0x04, 0x01, 0xF4, 0x00, 0xFA, 0x31, 0xA5],
            ),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        let reading = sensor.read().unwrap();
        assert_eq!(reading.humidity, 50.0);
        assert_eq!(reading.temperature, 25.0);
        i2c.done();
    }

    #[test]
    fn wake_and_command_failure_surfaces_both() {
        let expectations = vec![
            Transaction::write(DEFAULT_ADDRESS, vec![0x00]).with_error(ErrorKind::Other),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, 0x00, 0x04])
                .with_error(ErrorKind::Bus),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        let err = sensor.read().unwrap_err();
        assert!(matches!(
            err,
            CommunicationError::NoResponse {
                wake: ErrorKind::Other,
                command: ErrorKind::Bus
            }
        ));

        // Nothing is read and no settle delay is spent after a failed command.
        let (_, delay) = sensor.release();
        assert_eq!(delay.total_ns, 0);
        i2c.done();
    }

    #[test]
    fn command_failure_after_wake_is_transport_error() {
        let expectations = vec![
            Transaction::write(DEFAULT_ADDRESS, vec![0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, 0x00, 0x04])
                .with_error(ErrorKind::ArbitrationLoss),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        assert!(matches!(
            sensor.read(),
            Err(CommunicationError::Transport(ErrorKind::ArbitrationLoss))
        ));
        i2c.done();
    }

    #[test]
    fn read_failure_is_transport_error() {
        let expectations = vec![
            Transaction::write(DEFAULT_ADDRESS, vec![0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, 0x00, 0x04]),
            Transaction::read(DEFAULT_ADDRESS, vec![0; FRAME_LEN]).with_error(ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        assert!(matches!(
            sensor.read(),
            Err(CommunicationError::Transport(ErrorKind::Other))
        ));
        i2c.done();
    }

    #[test]
    fn corrupted_frame_is_checksum_error() {
        let expectations = exchange(
            register::HUMIDITY_MSB,
            [0x03, 0x04, 0x01, 0x2C, 0x00, 0xC8, 0x30, 0x4C],
        );
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::new(i2c.clone(), RecordingDelay::default());

        assert!(matches!(
            sensor.read(),
            Err(CommunicationError::Checksum {
                received: 0x4C30,
                computed: 0x4B30
            })
        ));
        i2c.done();
    }

    #[test]
    fn custom_address_is_used() {
        let expectations = vec![
            Transaction::write(0x5D, vec![0x00]),
            Transaction::write(0x5D, vec![0x03, 0x00, 0x04]),
            Transaction::read(0x5D, vec![0x03, 0x04, 0x01, 0x2C, 0x00, 0xC8, 0x30, 0x4B]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = Am2320::with_address(i2c.clone(), RecordingDelay::default(), 0x5D);

        assert_eq!(sensor.address(), 0x5D);
        assert!(sensor.read().is_ok());
        i2c.done();
    }
}
