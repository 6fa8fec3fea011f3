//! LM73 temperature readout over the memory-mapped TWI controller.

pub mod config;
pub mod delay;
#[cfg(test)]
mod fake;
pub mod lock;
pub mod mem;
pub mod regs;
pub mod twi;

use std::{fmt, io};

use embedded_hal::delay::DelayNs;
use lm73::Lm73;

use crate::{mem::MapError, regs::RegisterBlock, twi::TwiController};

/// Parameters of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// 7-bit sensor address
    pub address: u8,
    pub poll_limit: u32,
    pub wait_ready: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            address: lm73::DEFAULT_ADDR,
            poll_limit: twi::DEFAULT_POLL_LIMIT,
            wait_ready: false,
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Map(MapError),
    Lock(io::Error),
    Twi(twi::Error),
    NotDetected([u8; 2]),
    NotReady,
}

impl Error {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Twi(twi::Error::Timeout { .. }) => 3,
            Error::Map(_) | Error::Lock(_) => 2,
            Error::Twi(_) | Error::NotDetected(_) | Error::NotReady => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Map(e) => write!(f, "{e}"),
            Error::Lock(e) => write!(f, "bus lock: {e}"),
            Error::Twi(e) => write!(f, "{e}"),
            Error::NotDetected(_) => f.write_str("failed to detect LM73 temp sensor chip"),
            Error::NotReady => f.write_str("LM73 temperature data not ready"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Map(e) => Some(e),
            Error::Lock(e) => Some(e),
            Error::Twi(e) => Some(e),
            Error::NotDetected(_) | Error::NotReady => None,
        }
    }
}

impl From<MapError> for Error {
    fn from(e: MapError) -> Self {
        Error::Map(e)
    }
}

impl From<lm73::Error<twi::Error>> for Error {
    fn from(e: lm73::Error<twi::Error>) -> Self {
        match e {
            lm73::Error::I2c(e) => Error::Twi(e),
            lm73::Error::InvalidChipId(id) => Error::NotDetected(id),
            lm73::Error::NotReady => Error::NotReady,
        }
    }
}

/// Brings up the controller, detects and power cycles the sensor, then
/// reads the temperature in degrees Celsius.
///
/// The caller must hold the bus lock for the whole call.
pub fn measure<R: RegisterBlock>(regs: R, delay: &mut impl DelayNs, options: &Options) -> Result<f32, Error> {
    let mut twi = TwiController::new(regs).with_poll_limit(options.poll_limit);
    twi.enable();

    let mut sensor = Lm73::new(twi).with_address(options.address);
    log::info!("probing LM73 at {:#04x}", sensor.address());
    sensor.init(delay)?;

    if options.wait_ready {
        sensor.wait_data_ready(delay, lm73::DEFAULT_READY_ATTEMPTS)?;
    }

    let raw = sensor.read_raw()?;
    log::info!("raw reading {raw:#06x}");

    Ok(lm73::celsius(raw))
}

/// Result line printed on success.
pub fn format_reading(celsius: f32) -> String {
    format!("{celsius:.2}C")
}
