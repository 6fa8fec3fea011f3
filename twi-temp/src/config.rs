//! Command-line configuration.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::{lock, mem, twi, Options};

/// Read the LM73 temperature through the TWI controller.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    /// Sensor address as sent on the wire, in decimal (146 is the default
    /// strap; 144-154 address the first chip, 156-166 the second)
    #[arg(value_parser = parse_wire_address)]
    pub address: Option<u8>,
    /// Privileged memory device.
    #[arg(long, default_value = mem::DEFAULT_DEVICE)]
    pub mem_device: PathBuf,
    /// Physical base address of the TWI registers.
    #[arg(long, default_value = "0x71000020", value_parser = parse_phys_address)]
    pub base: u64,
    /// Status polls before a transfer times out.
    #[arg(long, default_value_t = twi::DEFAULT_POLL_LIMIT)]
    pub poll_limit: u32,
    /// Lock file shared by every program driving the bus.
    #[arg(long, default_value = lock::DEFAULT_LOCK_FILE)]
    pub lock_file: PathBuf,
    /// Wait for the data-ready flag before reading the temperature.
    #[arg(long)]
    pub wait_ready: bool,
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            address: self.address.map_or(lm73::DEFAULT_ADDR, |wire| wire >> 1),
            poll_limit: self.poll_limit,
            wait_ready: self.wait_ready,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Parses a decimal wire address; the low (read/write) bit must be clear.
fn parse_wire_address(s: &str) -> Result<u8, String> {
    let addr: u8 = s.parse().map_err(|e| format!("invalid address `{s}`: {e}"))?;
    match addr & 1 {
        0 => Ok(addr),
        _ => Err(format!("address {addr} has the read bit set")),
    }
}

fn parse_phys_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}
