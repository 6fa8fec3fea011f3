//! In-memory TWI controller for tests.

use std::{cell::Cell, collections::VecDeque};

use crate::regs::*;

/// Completes every triggered transfer immediately against a loopback slave.
///
/// Reads return queued `responses` first, then the last written word, masked
/// to the read length.
#[derive(Debug, Default)]
pub(crate) struct FakeTwi {
    words: [u32; BLOCK_LEN / 4],
    /// (address register, length, data)
    pub writes: Vec<(u8, usize, u32)>,
    /// (address register, length)
    pub reads: Vec<(u8, usize)>,
    pub responses: VecDeque<u32>,
    /// Status code reported with the error flag on every transfer
    pub error_code: Option<u8>,
    /// Never raise the done flag
    pub stall: bool,
    pub status_polls: Cell<usize>,
    last_written: u32,
}

impl FakeTwi {
    pub fn poke(&mut self, offset: usize, value: u32) {
        self.words[offset / 4] = value;
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.words[offset / 4]
    }

    fn complete(&mut self, control: u32) {
        if self.stall {
            self.poke(STATUS, 0);
            return;
        }

        let slave = self.peek(ADDRESS) as u8;

        if control & (1 << CTRL_WRITE) != 0 {
            let len = ((control & CTRL_WRITE_LEN_MASK) >> CTRL_WRITE_LEN_SHIFT) as usize + 1;
            let data = self.peek(DATA_OUT);
            self.writes.push((slave, len, data));
            self.last_written = data;
        } else {
            let len = (control & CTRL_READ_LEN_MASK) as usize + 1;
            self.reads.push((slave, len));
            let data = self.responses.pop_front().unwrap_or(self.last_written);
            self.poke(DATA_IN, data & (u32::MAX >> (32 - 8 * len)));
        }

        let status = match self.error_code {
            Some(code) => 1 << STATUS_ERROR | u32::from(code) << STATUS_CODE_SHIFT,
            None => 0xFF << STATUS_CODE_SHIFT,
        };
        self.poke(STATUS, status | 1 << STATUS_DONE);
    }
}

impl RegisterBlock for FakeTwi {
    fn read(&self, offset: usize) -> u32 {
        if offset == STATUS {
            self.status_polls.set(self.status_polls.get() + 1);
        }
        self.peek(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            CONTROL if value & (1 << CTRL_START) != 0 => {
                // start is self-clearing
                self.poke(CONTROL, value & !(1 << CTRL_START));
                self.complete(value);
            }
            STATUS => self.poke(STATUS, self.peek(STATUS) & !value),
            _ => self.poke(offset, value),
        }
    }
}
