//! Error types for mutex acquisition and release.
//!
//! Timeout and cancellation are sentinel variants so callers can tell them
//! apart from real I/O failures without string matching.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of mutex acquisition.
///
/// Release failure has no variant on purpose: a lock that cannot be given
/// back leaves the process in a state where mutual exclusion can no longer
/// be trusted, so [`LockGuard::release`](crate::LockGuard::release) aborts
/// instead of returning.
#[derive(Debug, Error)]
pub enum Error {
    /// Spec failed validation; no acquisition was attempted
    #[error("invalid mutex spec: {reason}")]
    InvalidSpec { reason: String },

    /// The spec's timeout elapsed before the mutex was acquired
    #[error("timeout waiting for mutex")]
    Timeout,

    /// The spec's cancellation token fired before the mutex was acquired
    #[error("mutex acquisition cancelled")]
    Cancelled,

    /// The OS locking primitive failed
    #[error("lock operation failed at {}: {}", .path.display(), .source)]
    Os {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Build an `InvalidSpec` error with the given reason.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Build an `Os` error for a failed operation on `path`.
    pub(crate) fn os(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Os {
            path: path.into(),
            source,
        }
    }
}
