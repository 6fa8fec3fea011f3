//! Physical memory access through the privileged memory device.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io,
    marker::PhantomData,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    ptr,
};

use memmap2::{MmapMut, MmapOptions};

use crate::regs::{RegisterBlock, BLOCK_LEN};

pub const DEFAULT_DEVICE: &str = "/dev/mem";

#[derive(Debug)]
pub enum MapError {
    /// The memory device could not be opened
    Open { path: PathBuf, source: io::Error },
    /// The kernel refused the mapping
    Map { address: u64, source: io::Error },
    /// The register block is misaligned or crosses the end of the page
    Layout { address: u64 },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Open { path, source } => write!(f, "open({}): {source}", path.display()),
            MapError::Map { address, source } => write!(f, "mmap({address:#010x}): {source}"),
            MapError::Layout { address } => {
                write!(f, "register block at {address:#010x} is misaligned or crosses a page")
            }
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Open { source, .. } | MapError::Map { source, .. } => Some(source),
            MapError::Layout { .. } => None,
        }
    }
}

/// An open memory device. Windows mapped from it borrow it, so the
/// descriptor stays open for as long as any mapping is in use.
#[derive(Debug)]
pub struct MemDevice {
    file: File,
    page_size: usize,
}

impl MemDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|source| MapError::Open { path: path.to_owned(), source })?;

        Ok(Self { file, page_size: page_size() })
    }

    /// Maps the page holding `address`. The returned window is positioned at
    /// `address` itself and covers the whole register block.
    pub fn map(&self, address: u64) -> Result<Window<'_>, MapError> {
        let (page, offset) = split_address(address, self.page_size);

        if offset % 4 != 0 || offset + BLOCK_LEN > self.page_size {
            return Err(MapError::Layout { address });
        }

        // SAFETY: the mapping is device memory shared with hardware; it is only
        // ever touched through volatile word accesses in `Window`.
        let map = unsafe { MmapOptions::new().offset(page).len(self.page_size).map_mut(&self.file) }
            .map_err(|source| MapError::Map { address, source })?;

        log::debug!("mapped page {page:#x} for {address:#x}");

        Ok(Window {
            map,
            offset,
            _device: PhantomData,
        })
    }
}

/// Word access to mapped physical memory, starting at the requested address.
#[derive(Debug)]
pub struct Window<'a> {
    map: MmapMut,
    offset: usize,
    _device: PhantomData<&'a MemDevice>,
}

impl Window<'_> {
    /// Bytes reachable from the window start.
    fn span(&self) -> usize {
        self.map.len() - self.offset
    }

    fn check(&self, offset: usize) -> usize {
        let at = self.offset + offset;
        assert!(at % 4 == 0 && offset + 4 <= self.span(), "register offset {offset:#x} outside window");
        at
    }
}

impl RegisterBlock for Window<'_> {
    fn read(&self, offset: usize) -> u32 {
        let at = self.check(offset);
        // SAFETY: `check` keeps the aligned word inside the live mapping.
        unsafe { ptr::read_volatile(self.map.as_ptr().add(at).cast::<u32>()) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        let at = self.check(offset);
        // SAFETY: as above; the mapping is writable and exclusively borrowed.
        unsafe { ptr::write_volatile(self.map.as_mut_ptr().add(at).cast::<u32>(), value) }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}

/// Splits an address into its page start and the offset inside that page.
fn split_address(address: u64, page_size: usize) -> (u64, usize) {
    let mask = page_size as u64 - 1;
    (address & !mask, (address & mask) as usize)
}
