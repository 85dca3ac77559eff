//! Advisory file locking for vault files (§4.8).
//!
//! A `<vault>.lock` sidecar file, held with a POSIX advisory lock via
//! [`fs2`], serializes concurrent `create`/`read`/`update` calls against the
//! same vault across processes on one host. Locking is advisory: it
//! protects cooperating `dual_vault` processes from each other, not against
//! a process that bypasses the lock file entirely.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use rand::rngs::OsRng;
use rand::Rng;

use crate::error::{Result, VaultError};

/// Starting backoff delay; doubles on each failed attempt up to `MAX_BACKOFF`.
const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(250);

/// A held advisory lock on one vault file. Releases the lock when dropped.
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Acquires an exclusive lock on `vault_path`'s sidecar lock file,
    /// retrying until `timeout` elapses.
    ///
    /// # Errors
    /// Returns [`VaultError::Lock`] if the lock cannot be acquired within
    /// `timeout`, or [`VaultError::Io`] if the sidecar file cannot be
    /// created.
    pub fn acquire(vault_path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = sidecar_path(vault_path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {
                    let jittered = OsRng.random_range(backoff / 2..=backoff);
                    std::thread::sleep(jittered.min(deadline.saturating_duration_since(Instant::now())));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(_) => return Err(VaultError::Lock(timeout)),
            }
        }

        write_holder_info(&file)?;
        Ok(Self {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn sidecar_path(vault_path: &Path) -> PathBuf {
    let mut os_string = vault_path.as_os_str().to_owned();
    os_string.push(".lock");
    PathBuf::from(os_string)
}

/// Records the holding process's PID and an acquisition timestamp, purely
/// as a diagnostic aid for an operator inspecting a stuck lock file; the
/// lock itself is enforced by the OS, not by this content.
fn write_holder_info(mut file: &File) -> Result<()> {
    use std::io::{Seek, SeekFrom};
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "pid={} acquired_at={:?}", std::process::id(), Instant::now())?;
    Ok(())
}
