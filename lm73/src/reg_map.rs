pub const DEFAULT_ADDR: u8 = 0x49;

pub(crate) const TEMP: u8 = 0x00;
pub(crate) const CONFIG: u8 = 0x01;
pub(crate) const CTRL_STATUS: u8 = 0x04;
pub(crate) const ID: u8 = 0x07;

pub(crate) const CHIP_ID: [u8; 2] = [0x01, 0x90];

// Sent once after detection, before the power cycle.
pub(crate) const STARTUP_BYTE: u8 = 0x01;

pub(crate) const CONFIG_DEFAULT: u8 = 0x40;
pub(crate) const CONFIG_SHUTDOWN: u8 = 1 << 7;

pub(crate) const DATA_AVAILABLE: u8 = 1 << 0;

pub(crate) const POWER_SETTLE_MS: u32 = 150;
pub(crate) const READY_POLL_MS: u32 = 10;
