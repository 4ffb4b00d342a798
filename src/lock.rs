//! Soft lock guarding read-modify-write of a shared dataset_description.json.
//!
//! The lock is the existence of a `<file>.lock` sibling, created exclusively.
//! It is advisory: only cooperating processes honour it.

use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held while the guarded file may be read and rewritten; released on drop
#[derive(Debug)]
pub struct DescriptionLock {
    path: PathBuf,
}

impl DescriptionLock {
    /// Lock file path used for `target`
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    /// Take the lock for `target`, waiting at most `timeout`
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let path = Self::lock_path(target);
        let start = Instant::now();
        let mut warned = false;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Owner pid helps when clearing a stale lock by hand
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        warn!("Could not record owner in {}: {}", path.display(), e);
                    }
                    debug!("Acquired lock {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !warned {
                        warn!(
                            "Lock file {} exists, waiting up to {:?}",
                            path.display(),
                            timeout
                        );
                        warned = true;
                    }
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(Error::LockTimeout { path, waited });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DescriptionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}
