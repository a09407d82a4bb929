//! Advisory per-session file lock.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Holds `flock(LOCK_EX)` on a session's lock file until dropped.
///
/// The lock is advisory: it only excludes other processes that also go
/// through `SessionLock`. The lock file itself is never deleted, so two
/// processes can never end up locking different inodes for one session.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
}

impl SessionLock {
    /// Block until the exclusive lock on `path` is held. Creates the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        flock(&file, libc::LOCK_EX).with_context(|| format!("flock failed on {}", path.display()))?;
        tracing::trace!(path = %path.display(), "session lock acquired");
        Ok(Self { file })
    }

    /// Take the lock only if nobody holds it. `None` means another holder.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e).with_context(|| format!("flock failed on {}", path.display())),
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

fn flock(file: &File, op: libc::c_int) -> io::Result<()> {
    loop {
        // SAFETY: the fd is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        // Closing the fd would release it as well; unlock explicitly so the
        // release does not depend on other dup'd descriptors.
        // SAFETY: the fd is still owned by `self.file`.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
