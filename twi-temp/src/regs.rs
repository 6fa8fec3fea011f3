//! TWI register block layout and bit-level access.

/// Physical base of the TWI register block.
pub const TWI_BASE: u64 = 0x7100_0020;

pub const CONTROL: usize = 0x00;
pub const ADDRESS: usize = 0x08;
pub const DATA_OUT: usize = 0x0C;
pub const DATA_IN: usize = 0x10;
pub const STATUS: usize = 0x14;

/// Bytes spanned by the register block.
pub const BLOCK_LEN: usize = STATUS + 4;

// control register
pub const CTRL_ENABLE: u32 = 31;
pub const CTRL_DATA_SWAP: u32 = 24;
pub const CTRL_START: u32 = 6;
pub const CTRL_READ_ONLY: u32 = 5;
pub const CTRL_WRITE: u32 = 4;
pub const CTRL_WRITE_LEN_SHIFT: u32 = 2;
pub const CTRL_WRITE_LEN_MASK: u32 = 0b11 << CTRL_WRITE_LEN_SHIFT;
pub const CTRL_READ_LEN_MASK: u32 = 0b11;

// status register
pub const STATUS_ERROR: u32 = 0;
pub const STATUS_DONE: u32 = 1;
pub const STATUS_CODE_SHIFT: u32 = 8;
/// Written to the status register to drop stale error and done flags.
pub const STATUS_CLEAR: u32 = 0b11;

/// Word-level access to a block of 32-bit registers.
///
/// Every bit helper is a single read followed by a single write.
pub trait RegisterBlock {
    fn read(&self, offset: usize) -> u32;

    fn write(&mut self, offset: usize, value: u32);

    fn modify(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    fn set_bit(&mut self, offset: usize, bit: u32) {
        self.modify(offset, |v| v | (1 << bit));
    }

    fn clear_bit(&mut self, offset: usize, bit: u32) {
        self.modify(offset, |v| v & !(1 << bit));
    }

    fn get_bit(&self, offset: usize, bit: u32) -> bool {
        self.read(offset) & (1 << bit) != 0
    }
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for &mut R {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}
