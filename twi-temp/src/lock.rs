//! Advisory lock serialising access to the bus between processes.

use std::{
    fs::{File, OpenOptions},
    io,
    os::{fd::AsRawFd, unix::fs::OpenOptionsExt},
    path::Path,
};

pub const DEFAULT_LOCK_FILE: &str = "/var/lock/twi.lock";

/// Exclusive `flock` on a shared lock file, released on drop.
#[derive(Debug)]
pub struct BusLock {
    file: File,
}

impl BusLock {
    /// Blocks until no other holder remains.
    pub fn acquire(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = open(path.as_ref())?;
        flock(&file, libc::LOCK_EX)?;
        log::debug!("bus lock acquired");
        Ok(Self { file })
    }

    /// Returns `None` instead of blocking when the lock is held elsewhere.
    pub fn try_acquire(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        let file = open(path.as_ref())?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for BusLock {
    fn drop(&mut self) {
        if let Err(e) = flock(&self.file, libc::LOCK_UN) {
            log::warn!("bus unlock failed: {e}");
        }
    }
}

fn open(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o666)
        .open(path)
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and open for the whole call.
    match unsafe { libc::flock(file.as_raw_fd(), operation) } {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}
