//! Polled TWI (I2C) master over the memory-mapped controller registers.
//!
//! The controller moves a whole 1-4 byte transfer once triggered and reports
//! completion through the done flag of the status register, which is polled
//! a bounded number of times.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::regs::*;

/// Done-flag reads made before a transfer is declared timed out.
pub const DEFAULT_POLL_LIMIT: u32 = 10_000;

const MAX_LEN: usize = 4;

/// Status byte reported by the controller after a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStatus {
    AddressWriteNack,
    DataNack,
    AddressReadNack,
    SdaStuckLow,
    SclStuckLow,
    NoError,
    Unknown(u8),
}

impl BusStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x20 => BusStatus::AddressWriteNack,
            0x30 => BusStatus::DataNack,
            0x48 => BusStatus::AddressReadNack,
            0x70 => BusStatus::SdaStuckLow,
            0x90 => BusStatus::SclStuckLow,
            0xFF => BusStatus::NoError,
            code => BusStatus::Unknown(code),
        }
    }
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusStatus::AddressWriteNack => f.write_str("address+write transmitted, slave NACK"),
            BusStatus::DataNack => f.write_str("data byte transmitted, NACK"),
            BusStatus::AddressReadNack => f.write_str("address+read transmitted, NACK"),
            BusStatus::SdaStuckLow => f.write_str("bus error, data line stuck low"),
            BusStatus::SclStuckLow => f.write_str("bus error, clock line stuck low"),
            BusStatus::NoError => f.write_str("no error"),
            BusStatus::Unknown(code) => write!(f, "unknown error {code:X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The done flag never came up
    Timeout { polls: u32 },
    /// The controller flagged an error
    Bus(BusStatus),
    /// Transfers carry 1 to 4 bytes
    Length(usize),
    /// `enable` has not been called
    Disabled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout { polls } => write!(f, "timeout after {polls} polls"),
            Error::Bus(status) => write!(f, "ERROR: {status}"),
            Error::Length(len) => write!(f, "transfer length {len} outside 1..={MAX_LEN}"),
            Error::Disabled => f.write_str("TWI controller not enabled"),
        }
    }
}

impl std::error::Error for Error {}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Bus(BusStatus::AddressWriteNack | BusStatus::AddressReadNack) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Error::Bus(BusStatus::DataNack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::Bus(BusStatus::SdaStuckLow | BusStatus::SclStuckLow) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Enabled,
    WritePending,
    ReadPending,
    Done,
    Error,
    Timeout,
}

/// TWI controller driver
#[derive(Debug)]
pub struct TwiController<R> {
    regs: R,
    state: State,
    poll_limit: u32,
}

impl<R: RegisterBlock> TwiController<R> {
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            state: State::Uninitialized,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }

    pub fn with_poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = limit.max(1);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Turns the controller on with data swapping disabled and clears any
    /// stale status flags.
    pub fn enable(&mut self) {
        self.regs.set_bit(CONTROL, CTRL_ENABLE);
        self.regs.clear_bit(CONTROL, CTRL_DATA_SWAP);
        self.regs.write(STATUS, STATUS_CLEAR);
        self.state = State::Enabled;
    }

    /// Sends `len` bytes of `data`, least significant byte first.
    ///
    /// `slave` is the address register value, i.e. the 7-bit address shifted
    /// left by one.
    pub fn write(&mut self, slave: u8, len: usize, data: u32) -> Result<(), Error> {
        self.check(len)?;
        log::debug!("write {slave:#04x} len {len} data {data:#x}");

        self.regs.clear_bit(CONTROL, CTRL_READ_ONLY);
        self.regs.set_bit(CONTROL, CTRL_WRITE);
        self.regs.modify(CONTROL, |v| {
            v & !CTRL_WRITE_LEN_MASK | ((len as u32 - 1) << CTRL_WRITE_LEN_SHIFT)
        });
        self.regs.write(DATA_OUT, data);
        self.regs.write(ADDRESS, slave.into());

        self.state = State::WritePending;
        self.start()
    }

    /// Reads `len` bytes, returned least significant byte first.
    pub fn read(&mut self, slave: u8, len: usize) -> Result<u32, Error> {
        self.check(len)?;

        self.regs.modify(CONTROL, |v| v & !CTRL_READ_LEN_MASK | (len as u32 - 1));
        self.regs.clear_bit(CONTROL, CTRL_READ_ONLY);
        self.regs.clear_bit(CONTROL, CTRL_WRITE);
        self.regs.write(ADDRESS, slave.into());

        self.state = State::ReadPending;
        self.start()?;

        let data = self.regs.read(DATA_IN);
        log::debug!("read {slave:#04x} len {len} data {data:#x}");
        Ok(data)
    }

    pub fn release(self) -> R {
        self.regs
    }

    fn check(&self, len: usize) -> Result<(), Error> {
        if self.state == State::Uninitialized {
            return Err(Error::Disabled);
        }
        match (1..=MAX_LEN).contains(&len) {
            true => Ok(()),
            false => Err(Error::Length(len)),
        }
    }

    /// Triggers the prepared transfer and waits for the controller to retire it
    fn start(&mut self) -> Result<(), Error> {
        self.regs.set_bit(CONTROL, CTRL_START);

        for polls in 1..=self.poll_limit {
            if self.regs.get_bit(STATUS, STATUS_DONE) {
                log::trace!("done after {polls} polls");
                return self.finish();
            }
        }

        // the transfer may still be in flight; nothing resets it here
        self.state = State::Timeout;
        Err(Error::Timeout { polls: self.poll_limit })
    }

    fn finish(&mut self) -> Result<(), Error> {
        let status = self.regs.read(STATUS);

        if status & (1 << STATUS_ERROR) != 0 {
            let status = BusStatus::from_code((status >> STATUS_CODE_SHIFT) as u8);
            log::debug!("transfer failed: {status}");
            self.state = State::Error;
            return Err(Error::Bus(status));
        }

        self.state = State::Done;
        Ok(())
    }
}

impl<R> ErrorType for TwiController<R> {
    type Error = Error;
}

/// Each operation runs as its own transfer; the controller has no repeated
/// start across operations.
impl<R: RegisterBlock> I2c<SevenBitAddress> for TwiController<R> {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let slave = address << 1;

        for op in operations {
            match op {
                Operation::Write(bytes) => self.write(slave, bytes.len(), pack(bytes))?,
                Operation::Read(buffer) => {
                    let data = self.read(slave, buffer.len())?;
                    unpack(data, buffer);
                }
            }
        }

        Ok(())
    }
}

fn pack(bytes: &[u8]) -> u32 {
    bytes.iter().rev().fold(0, |word, &b| word << 8 | u32::from(b))
}

fn unpack(word: u32, buffer: &mut [u8]) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = (word >> (8 * i)) as u8;
    }
}
