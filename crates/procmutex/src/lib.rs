//! # Procmutex
//!
//! Named cross-process mutual exclusion - strictly functional Rust with
//! zero unwraps.
//!
//! Callers in any number of processes acquire a mutex by name; exactly one
//! holder exists machine-wide at a time. Within a process a registry keeps
//! a single OS-level acquisition attempt in flight per name and hands the
//! lock to local waiters in FIFO order, racing each caller's wait against
//! its timeout and cancellation token.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use procmutex::Spec;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), procmutex::Error> {
//!     let spec = Spec::new("my-database").with_timeout(Duration::from_secs(30));
//!     let guard = procmutex::acquire(spec).await?;
//!     // Critical section here
//!     guard.release();
//!     Ok(())
//! }
//! ```
//!
//! Scoping: specs with different prefixes resolve to different locks, so
//! `Spec::new("n").with_prefix("p0")` and `Spec::new("n").with_prefix("p1")`
//! never contend.

mod acquire;
mod error;
mod flock;
mod guard;
mod registry;
mod spec;

pub use acquire::acquire;
pub use error::{Error, Result};
pub use flock::lock_path;
pub use guard::LockGuard;
pub use registry::MutexRegistry;
pub use spec::{LockName, Spec, DEFAULT_DELAY, DEFAULT_PREFIX, MAX_PREFIX_LEN};
// Re-export the cancellation token type so callers don't need tokio-util
pub use tokio_util::sync::CancellationToken;
