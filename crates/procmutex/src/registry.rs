//! Acquisition coordinator.
//!
//! Tracks every mutex name with local interest and keeps at most one
//! OS-level acquisition attempt in flight per name within this process. A
//! blocking `flock(2)` cannot be cancelled, so an attempt whose waiters
//! have all given up is allowed to finish and its lock is released
//! unclaimed; running one attempt thread per name keeps those orphaned
//! attempts from growing without bound.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::flock;
use crate::guard::LockGuard;
use crate::spec::LockName;

/// Outcome of one OS acquisition attempt, delivered to exactly one waiter.
pub(crate) type AcquireOutcome = Result<LockGuard>;

type WaiterQueue = VecDeque<Waiter>;
type ActiveMap = HashMap<String, WaiterQueue>;

/// One queued local request for a mutex.
struct Waiter {
    tx: oneshot::Sender<AcquireOutcome>,
}

impl Waiter {
    /// Offer `outcome` to this waiter.
    ///
    /// A waiter whose receiver is gone has abandoned the acquisition; the
    /// outcome is handed back so it can go to the next in line.
    fn deliver(self, outcome: AcquireOutcome) -> std::result::Result<(), AcquireOutcome> {
        self.tx.send(outcome)
    }
}

/// Coordinator for mutex acquisitions within one process.
///
/// Cloning is cheap and clones share state. Separate registries coordinate
/// independently, so two registries in the same process contend through
/// the OS lock exactly like two processes would.
#[derive(Clone, Default)]
pub struct MutexRegistry {
    active: Arc<Mutex<ActiveMap>>,
}

impl MutexRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request for `lock_name` and return the channel its outcome
    /// arrives on.
    ///
    /// A map entry exists exactly while a waiter is queued or an attempt is
    /// in flight, so entry presence doubles as the single-flight flag: the
    /// attempt thread is spawned only when the entry is created.
    pub(crate) fn submit(
        &self,
        lock_name: &LockName,
        delay: Duration,
    ) -> Result<oneshot::Receiver<AcquireOutcome>> {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter { tx };

        let mut active = lock_active(&self.active);
        if let Some(waiters) = active.get_mut(lock_name.as_str()) {
            tracing::debug!("queueing waiter for {lock_name}");
            waiters.push_back(waiter);
            return Ok(rx);
        }

        let registry = self.clone();
        let name = lock_name.clone();
        thread::Builder::new()
            .name(format!("procmutex-{lock_name}"))
            .spawn(move || registry.attempt_loop(&name, delay))
            .map_err(|e| Error::os(flock::lock_path(lock_name), e))?;

        active.insert(lock_name.as_str().to_owned(), VecDeque::from([waiter]));
        Ok(rx)
    }

    /// Run OS attempts for `name` until no waiters remain.
    fn attempt_loop(&self, name: &LockName, delay: Duration) {
        while self.attempt_once(name, delay) {}
    }

    /// One OS acquisition followed by delivery under the registry lock.
    ///
    /// Returns whether waiters remain and another attempt is needed. The
    /// attempt loop is the only code that pops the queue or removes the
    /// entry.
    fn attempt_once(&self, name: &LockName, delay: Duration) -> bool {
        let outcome = flock::acquire(name, delay);

        let mut active = lock_active(&self.active);
        let Some(waiters) = active.get_mut(name.as_str()) else {
            drop(active);
            release_unclaimed(name, outcome);
            return false;
        };

        let mut pending = Some(outcome);
        while let Some(outcome) = pending.take() {
            match waiters.pop_front() {
                Some(waiter) => {
                    if let Err(returned) = waiter.deliver(outcome) {
                        pending = Some(returned);
                    }
                }
                None => {
                    pending = Some(outcome);
                    break;
                }
            }
        }

        let keep_going = !waiters.is_empty();
        if let Some(unclaimed) = pending {
            release_unclaimed(name, unclaimed);
        }
        if !keep_going {
            active.remove(name.as_str());
        }
        keep_going
    }
}

fn lock_active(active: &Mutex<ActiveMap>) -> MutexGuard<'_, ActiveMap> {
    match active.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Release a lock that no waiter accepted. A failed outcome has nothing to
/// release; a successful one must not stay locked with no owner.
fn release_unclaimed(name: &LockName, outcome: AcquireOutcome) {
    if let Ok(guard) = outcome {
        tracing::debug!("releasing unclaimed lock for {name}");
        guard.release();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot::error::TryRecvError;

    use super::*;

    const DELAY: Duration = Duration::from_millis(25);

    fn test_name(tag: &str) -> LockName {
        LockName::resolve(
            Some("pmtest"),
            &format!("registry-{}-{tag}", std::process::id()),
        )
    }

    fn recv_guard(rx: oneshot::Receiver<AcquireOutcome>) -> LockGuard {
        rx.blocking_recv()
            .expect("attempt thread dropped the sender")
            .expect("acquisition failed")
    }

    #[test]
    fn uncontended_submit_delivers_a_guard() {
        let registry = MutexRegistry::new();
        let name = test_name("uncontended");
        let rx = registry.submit(&name, DELAY).unwrap();
        let guard = recv_guard(rx);
        guard.release();
    }

    #[test]
    fn queued_waiters_share_one_entry_and_run_in_order() {
        let registry = MutexRegistry::new();
        let name = test_name("fifo");

        let holder = recv_guard(registry.submit(&name, DELAY).unwrap());

        let rx_first = registry.submit(&name, DELAY).unwrap();
        let mut rx_second = registry.submit(&name, DELAY).unwrap();
        {
            let active = registry.active.lock().unwrap();
            assert_eq!(active.len(), 1);
            assert_eq!(active.get(name.as_str()).map(VecDeque::len), Some(2));
        }

        holder.release();
        let first = recv_guard(rx_first);
        assert!(matches!(rx_second.try_recv(), Err(TryRecvError::Empty)));

        first.release();
        let second = recv_guard(rx_second);
        second.release();

        assert!(registry.active.lock().unwrap().is_empty());
    }

    #[test]
    fn dead_waiters_are_skipped() {
        let registry = MutexRegistry::new();
        let name = test_name("skip");

        let holder = recv_guard(registry.submit(&name, DELAY).unwrap());

        let rx_abandoned = registry.submit(&name, DELAY).unwrap();
        let rx_live = registry.submit(&name, DELAY).unwrap();
        drop(rx_abandoned);

        holder.release();
        let guard = recv_guard(rx_live);
        guard.release();
    }

    #[test]
    fn unclaimed_outcome_is_released_and_entry_removed() {
        let registry = MutexRegistry::new();
        let name = test_name("unclaimed");

        let holder = recv_guard(registry.submit(&name, DELAY).unwrap());
        let rx = registry.submit(&name, DELAY).unwrap();
        drop(rx);
        holder.release();

        // The attempt finishes with nobody waiting and cleans up after
        // itself.
        for _ in 0..200 {
            if registry.active.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(registry.active.lock().unwrap().is_empty());

        // The unclaimed lock was released, so it can be taken again.
        let guard = recv_guard(registry.submit(&name, DELAY).unwrap());
        guard.release();
    }

    #[test]
    fn clones_share_the_same_queue() {
        let registry = MutexRegistry::new();
        let clone = registry.clone();
        let name = test_name("clone");

        let holder = recv_guard(registry.submit(&name, DELAY).unwrap());
        let rx = clone.submit(&name, DELAY).unwrap();
        assert_eq!(registry.active.lock().unwrap().len(), 1);

        holder.release();
        let guard = recv_guard(rx);
        guard.release();
    }
}
