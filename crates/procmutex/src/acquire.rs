//! Acquisition orchestration.
//!
//! Validates the spec, queues the request with the registry, and races the
//! coordinator's answer against the spec's timeout and cancellation token.
//! The first event wins; losing a race never leaks a lock.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::sync::LazyLock;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::flock;
use crate::guard::LockGuard;
use crate::registry::{AcquireOutcome, MutexRegistry};
use crate::spec::{LockName, Spec};

static GLOBAL: LazyLock<MutexRegistry> = LazyLock::new(MutexRegistry::new);

/// Acquire the named mutex through the process-wide registry.
///
/// Returns when the mutex is held, the spec's timeout elapses, or its
/// cancellation token fires, whichever comes first.
pub async fn acquire(spec: Spec) -> Result<LockGuard> {
    GLOBAL.acquire(spec).await
}

impl MutexRegistry {
    /// Acquire the named mutex through this registry.
    ///
    /// Validation runs first and an invalid spec is rejected before any
    /// file is touched. Waiters for the same name are served in the order
    /// they called here.
    pub async fn acquire(&self, spec: Spec) -> Result<LockGuard> {
        spec.validate()?;
        let lock_name = spec.lock_name();
        tracing::debug!("acquiring mutex {lock_name}");

        let mut rx = self.submit(&lock_name, spec.delay)?;
        let cancel = spec.cancel.unwrap_or_default();

        tokio::select! {
            outcome = &mut rx => finish(outcome, &lock_name),
            _ = wait_timeout(spec.timeout) => Err(abandon(rx, &lock_name, Error::Timeout)),
            _ = cancel.cancelled() => Err(abandon(rx, &lock_name, Error::Cancelled)),
        }
    }
}

/// Sleep for the spec's timeout, or forever when none is set.
async fn wait_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending::<()>().await,
    }
}

fn finish(
    outcome: std::result::Result<AcquireOutcome, oneshot::error::RecvError>,
    lock_name: &LockName,
) -> Result<LockGuard> {
    match outcome {
        Ok(outcome) => outcome,
        // The attempt thread dropped the sender without answering; it owns
        // queue cleanup, so nothing is held on this side.
        Err(e) => Err(Error::os(
            flock::lock_path(lock_name),
            std::io::Error::other(e),
        )),
    }
}

/// Give up on a pending acquisition.
///
/// An outcome that arrived during the race window is drained and released
/// here, so an abandoned acquisition never strands a held lock. Closing
/// the receiver also marks the waiter dead for the attempt loop.
fn abandon(
    mut rx: oneshot::Receiver<AcquireOutcome>,
    lock_name: &LockName,
    err: Error,
) -> Error {
    rx.close();
    if let Ok(Ok(guard)) = rx.try_recv() {
        tracing::debug!("releasing {lock_name}, acquired after abandonment");
        guard.release();
    }
    tracing::debug!("abandoned acquisition of {lock_name}: {err}");
    err
}
