//! Handle to a held mutex.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

/// A held mutex.
///
/// The guard owns the file holding the OS lock. [`LockGuard::release`] is
/// idempotent, and dropping the guard releases it as well. A release that
/// fails is unrecoverable: continuing would let another process take the
/// lock while this one still believes it is held, so the process aborts.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LockGuard {
    pub(crate) fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Mutex::new(Some(file)),
        }
    }

    /// Path of the lock file backing this mutex.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the mutex. Only the first call has any effect.
    pub fn release(&self) {
        let mut slot = match self.file.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(file) = slot.take() else {
            return;
        };
        match file.unlock() {
            Ok(()) => tracing::debug!("released lock file {}", self.path.display()),
            Err(e) => {
                tracing::error!(
                    "failed to release lock file {}, aborting: {}",
                    self.path.display(),
                    e
                );
                std::process::abort();
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}
