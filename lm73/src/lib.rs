//! Driver for the LM73 temperature sensor.
//!
//! The chip is addressed through any [`I2c`] implementation. Every pointer
//! write and register read is issued as its own bus transaction.

#![cfg_attr(not(test), no_std)]

mod reg_map;

use core::fmt;

use embedded_hal::{delay::DelayNs, i2c::{I2c, SevenBitAddress}};

pub use reg_map::DEFAULT_ADDR;

/// Read attempts made by [`Lm73::wait_data_ready`] when no other bound is wanted.
pub const DEFAULT_READY_ATTEMPTS: u32 = 10;

#[derive(Debug)]
pub enum Error<E> {
    /// I2C bus error
    I2c(E),
    /// Identity register did not match
    InvalidChipId([u8; 2]),
    /// Data-ready flag stayed clear
    NotReady,
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "{e}"),
            Error::InvalidChipId([lo, hi]) => write!(f, "unexpected chip id {lo:02X} {hi:02X}"),
            Error::NotReady => f.write_str("temperature data not ready"),
        }
    }
}

#[derive(Debug)]
pub struct Lm73<I> {
    i2c: I,
    i2c_addr: u8,
}

impl<I, E> Lm73<I>
where
    I: I2c<SevenBitAddress, Error = E>,
{
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            i2c_addr: reg_map::DEFAULT_ADDR,
        }
    }

    /// Selects another strap address (7-bit).
    pub fn with_address(mut self, addr: u8) -> Self {
        self.i2c_addr = addr;
        self
    }

    pub fn address(&self) -> u8 {
        self.i2c_addr
    }

    /// Checks the chip identity, then power cycles it.
    ///
    /// Both power transitions are followed by 150ms of settling time.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let id = self.read_id()?;

        if id != reg_map::CHIP_ID {
            return Err(Error::InvalidChipId(id));
        }

        self.write(&[reg_map::STARTUP_BYTE])?;

        self.set_power(false)?;
        delay.delay_ms(reg_map::POWER_SETTLE_MS);
        self.set_power(true)?;
        delay.delay_ms(reg_map::POWER_SETTLE_MS);

        Ok(())
    }

    pub fn detect(&mut self) -> Result<bool, Error<E>> {
        self.read_id().map(|id| id == reg_map::CHIP_ID)
    }

    /// Reads the two identity bytes in bus order.
    pub fn read_id(&mut self) -> Result<[u8; 2], Error<E>> {
        self.read_pair(reg_map::ID)
    }

    pub fn set_power(&mut self, on: bool) -> Result<(), Error<E>> {
        let config = match on {
            true => reg_map::CONFIG_DEFAULT,
            false => reg_map::CONFIG_DEFAULT | reg_map::CONFIG_SHUTDOWN,
        };

        self.write(&[reg_map::CONFIG, config])
    }

    /// Reads the temperature register, most significant byte first.
    pub fn read_raw(&mut self) -> Result<u16, Error<E>> {
        self.read_pair(reg_map::TEMP).map(u16::from_be_bytes)
    }

    pub fn temperature(&mut self) -> Result<f32, Error<E>> {
        self.read_raw().map(celsius)
    }

    /// Returns the data-available flag of the control/status register.
    pub fn data_ready(&mut self) -> Result<bool, Error<E>> {
        let mut status = [0; 1];
        self.write(&[reg_map::CTRL_STATUS])?;
        self.i2c.read(self.i2c_addr, &mut status).map_err(Error::I2c)?;

        Ok(status[0] & reg_map::DATA_AVAILABLE != 0)
    }

    /// Polls [`Self::data_ready`] up to `attempts` times, 10ms apart.
    pub fn wait_data_ready(&mut self, delay: &mut impl DelayNs, attempts: u32) -> Result<(), Error<E>> {
        for attempt in 1..=attempts {
            if self.data_ready()? {
                return Ok(());
            }
            if attempt < attempts {
                delay.delay_ms(reg_map::READY_POLL_MS);
            }
        }

        Err(Error::NotReady)
    }

    pub fn release(self) -> I {
        self.i2c
    }

    /// Points at the register, then reads two bytes back
    fn read_pair(&mut self, pointer: u8) -> Result<[u8; 2], Error<E>> {
        let mut bytes = [0; 2];
        self.write(&[pointer])?;
        self.i2c.read(self.i2c_addr, &mut bytes).map(|_| bytes).map_err(Error::I2c)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        self.i2c.write(self.i2c_addr, bytes).map_err(Error::I2c)
    }
}

/// Converts a raw reading to degrees Celsius (1 LSB = 1/128 °C).
pub fn celsius(raw: u16) -> f32 {
    raw as i16 as f32 / 128.0
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Write(u8, Vec<u8>),
        Read(u8, usize),
    }

    #[derive(Debug)]
    struct BusError;

    impl embedded_hal::i2c::Error for BusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    impl fmt::Display for BusError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bus error")
        }
    }

    #[derive(Default)]
    struct Bus {
        ops: Vec<Op>,
        responses: VecDeque<Vec<u8>>,
        fail_writes: bool,
    }

    impl Bus {
        fn with_responses(responses: &[&[u8]]) -> Self {
            Self {
                responses: responses.iter().map(|r| r.to_vec()).collect(),
                ..Default::default()
            }
        }

        fn writes(&self) -> Vec<Vec<u8>> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Write(_, bytes) => Some(bytes.clone()),
                    Op::Read(..) => None,
                })
                .collect()
        }
    }

    impl ErrorType for Bus {
        type Error = BusError;
    }

    impl I2c for Bus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if self.fail_writes {
                            return Err(BusError);
                        }
                        self.ops.push(Op::Write(address, bytes.to_vec()));
                    }
                    Operation::Read(buf) => {
                        self.ops.push(Op::Read(address, buf.len()));
                        let response = self.responses.pop_front().unwrap_or_default();
                        for (dst, src) in buf.iter_mut().zip(response) {
                            *dst = src;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        ms: Vec<u32>,
    }

    impl DelayNs for Delay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.ms.push(ms);
        }
    }

    #[test]
    fn detect_matches_identity_bytes() {
        let mut bus = Bus::with_responses(&[&[0x01, 0x90]]);
        assert!(Lm73::new(&mut bus).detect().unwrap());
        assert_eq!(bus.ops, vec![Op::Write(DEFAULT_ADDR, vec![0x07]), Op::Read(DEFAULT_ADDR, 2)]);
    }

    #[test]
    fn detect_rejects_swapped_identity() {
        let mut bus = Bus::with_responses(&[&[0x90, 0x01]]);
        assert!(!Lm73::new(&mut bus).detect().unwrap());
    }

    #[test]
    fn power_off_sets_shutdown_bit() {
        let mut bus = Bus::default();
        let mut lm73 = Lm73::new(&mut bus);
        lm73.set_power(false).unwrap();
        lm73.set_power(true).unwrap();
        assert_eq!(bus.writes(), vec![vec![0x01, 0xC0], vec![0x01, 0x40]]);
    }

    #[test]
    fn init_runs_power_sequence() {
        let mut bus = Bus::with_responses(&[&[0x01, 0x90]]);
        let mut delay = Delay::default();
        let mut lm73 = Lm73::new(&mut bus).with_address(0x4E);
        lm73.init(&mut delay).unwrap();
        let bus = lm73.release();

        assert_eq!(
            bus.ops,
            vec![
                Op::Write(0x4E, vec![0x07]),
                Op::Read(0x4E, 2),
                Op::Write(0x4E, vec![0x01]),
                Op::Write(0x4E, vec![0x01, 0xC0]),
                Op::Write(0x4E, vec![0x01, 0x40]),
            ]
        );
        assert_eq!(delay.ms, vec![150, 150]);
    }

    #[test]
    fn init_reports_unknown_chip() {
        let mut bus = Bus::with_responses(&[&[0x12, 0x34]]);
        let mut delay = Delay::default();
        let err = Lm73::new(&mut bus).init(&mut delay).unwrap_err();

        assert!(matches!(err, Error::InvalidChipId([0x12, 0x34])));
        assert_eq!(bus.ops.len(), 2);
        assert!(delay.ms.is_empty());
    }

    #[test]
    fn bus_errors_propagate() {
        let mut bus = Bus {
            fail_writes: true,
            ..Default::default()
        };
        assert!(matches!(Lm73::new(&mut bus).detect(), Err(Error::I2c(BusError))));
    }

    #[test]
    fn raw_reading_is_most_significant_byte_first() {
        let mut bus = Bus::with_responses(&[&[0x02, 0x01]]);
        assert_eq!(Lm73::new(&mut bus).read_raw().unwrap(), 0x0201);
        assert_eq!(bus.writes(), vec![vec![0x00]]);
    }

    #[test]
    fn temperature_from_bus_bytes() {
        let mut bus = Bus::with_responses(&[&[0x00, 0x80]]);
        assert_eq!(Lm73::new(&mut bus).temperature().unwrap(), 1.0);
    }

    #[test]
    fn conversion_points() {
        assert_eq!(celsius(0x0000), 0.0);
        assert_eq!(celsius(0x0080), 1.0);
        assert_eq!(celsius(0xFF80), -1.0);
        assert_eq!(celsius(0x0C80), 25.0);
    }

    #[test]
    fn wait_data_ready_polls_until_flag() {
        let mut bus = Bus::with_responses(&[&[0x00], &[0x00], &[0x01]]);
        let mut delay = Delay::default();
        Lm73::new(&mut bus).wait_data_ready(&mut delay, DEFAULT_READY_ATTEMPTS).unwrap();

        assert_eq!(bus.writes(), vec![vec![0x04]; 3]);
        assert_eq!(delay.ms, vec![10, 10]);
    }

    #[test]
    fn wait_data_ready_gives_up() {
        let mut bus = Bus::default();
        let mut delay = Delay::default();
        let err = Lm73::new(&mut bus).wait_data_ready(&mut delay, 3).unwrap_err();

        assert!(matches!(err, Error::NotReady));
        assert_eq!(bus.writes().len(), 3);
        assert_eq!(delay.ms, vec![10, 10]);
    }
}
