//! Mutex naming and acquisition parameters.
//!
//! A [`Spec`] says which mutex to acquire and how long to try; a
//! [`LockName`] is the resolved identity that keys both the in-process
//! registry and the backing lock file.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Scope prefix used when a spec does not provide one.
pub const DEFAULT_PREFIX: &str = "mutex";

/// Longest allowed scope prefix.
///
/// The digest is 32 hex characters; 7 prefix characters plus the dash keep
/// the resolved identity within 40 characters.
pub const MAX_PREFIX_LEN: usize = 7;

/// Poll interval used when a spec does not provide one.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);

/// Parameters for one mutex acquisition.
///
/// Fields are public; [`Spec::validate`] runs at acquire time before any
/// file is touched.
#[derive(Debug, Clone)]
pub struct Spec {
    /// Name of the mutex. Must be non-empty.
    pub name: String,

    /// Optional scope prefix.
    ///
    /// Specs with different prefixes resolve to different lock identities,
    /// so they never contend even for the same name. Empty or absent falls
    /// back to [`DEFAULT_PREFIX`].
    pub prefix: Option<String>,

    /// How often polling targets re-check the lock. Must be non-zero.
    pub delay: Duration,

    /// How long to wait before giving up. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Cancels a pending acquisition when triggered.
    pub cancel: Option<CancellationToken>,
}

impl Spec {
    /// Create a spec for `name` with the default delay, no prefix, no
    /// timeout, and no cancellation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            delay: DEFAULT_DELAY,
            timeout: None,
            cancel: None,
        }
    }

    /// Set the scope prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the poll interval for polling targets.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Give up with a timeout error after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancel the acquisition when `cancel` is triggered.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Check the spec for validity.
    ///
    /// Each rule is checked independently; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
            .and_then(|()| validate_prefix(self.prefix.as_deref()))
            .and_then(|()| validate_delay(self.delay))
            .and_then(|()| validate_timeout(self.timeout))
    }

    /// Resolve the lock identity for this spec.
    #[must_use]
    pub fn lock_name(&self) -> LockName {
        LockName::resolve(self.prefix.as_deref(), &self.name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        Err(Error::invalid_spec("missing name"))
    } else {
        Ok(())
    }
}

fn validate_prefix(prefix: Option<&str>) -> Result<()> {
    match prefix {
        Some(p) if p.len() > MAX_PREFIX_LEN => Err(Error::invalid_spec(format!(
            "prefix length cannot be greater than {MAX_PREFIX_LEN}"
        ))),
        _ => Ok(()),
    }
}

fn validate_delay(delay: Duration) -> Result<()> {
    if delay.is_zero() {
        Err(Error::invalid_spec("delay must be > 0"))
    } else {
        Ok(())
    }
}

fn validate_timeout(timeout: Option<Duration>) -> Result<()> {
    match timeout {
        Some(t) if t.is_zero() => Err(Error::invalid_spec("timeout must be > 0 when set")),
        _ => Ok(()),
    }
}

/// Resolved identity of a mutex: `<prefix>-<md5 hex of the name>`.
///
/// The digest keeps arbitrary names safe to use as file names and keeps
/// the identity a fixed width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockName(String);

impl LockName {
    /// Resolve the identity for `prefix` and `name`.
    ///
    /// Resolution is total and deterministic; length limits are enforced
    /// by [`Spec::validate`], not here.
    #[must_use]
    pub fn resolve(prefix: Option<&str>, name: &str) -> Self {
        let prefix = match prefix {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_PREFIX,
        };
        let digest = md5::compute(name.as_bytes());
        Self(format!("{prefix}-{digest:x}"))
    }

    /// The resolved identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
