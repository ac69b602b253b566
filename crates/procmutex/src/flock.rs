//! OS-level lock primitive backed by advisory file locks.
//!
//! Each mutex maps to one lock file in the system temporary directory,
//! named after the resolved [`LockName`]. Unix targets block in the
//! `flock(2)` wrapper provided by `fs2`; targets without a blocking lock
//! poll `try_lock_exclusive` at the spec's delay interval. Lock files are
//! created as needed and never removed, which keeps their identity stable
//! for every process on the host.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;

use crate::error::{Error, Result};
use crate::guard::LockGuard;
use crate::spec::LockName;

/// Path of the lock file backing `lock_name`.
#[must_use]
pub fn lock_path(lock_name: &LockName) -> PathBuf {
    std::env::temp_dir().join(lock_name.as_str())
}

/// Acquire the OS lock for `lock_name`, waiting until it is held.
///
/// `delay` is the re-check interval on polling targets; blocking targets
/// ignore it.
pub(crate) fn acquire(lock_name: &LockName, delay: Duration) -> Result<LockGuard> {
    let path = lock_path(lock_name);
    let file = open_lock_file(&path)?;
    remediate_sudo_ownership(&path);
    wait_exclusive(&file, delay).map_err(|e| Error::os(&path, e))?;
    tracing::debug!("acquired lock file {}", path.display());
    Ok(LockGuard::new(path, file))
}

fn open_lock_file(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|e| Error::os(path, e))
}

/// Hand lock file ownership back to the invoking user when running under
/// sudo.
///
/// A lock file created by root stays owned by root, and later unprivileged
/// runs then fail to open it. When the sudo environment markers are present
/// the file is chowned back to `SUDO_UID`/`SUDO_GID`. Failure never stops
/// the acquisition; it is logged and the lock attempt continues.
#[cfg(unix)]
fn remediate_sudo_ownership(path: &Path) {
    let Ok(cmd) = std::env::var("SUDO_COMMAND") else {
        return;
    };
    if cmd.is_empty() {
        return;
    }
    match sudo_ids() {
        Ok((uid, gid)) => {
            if let Err(e) = std::os::unix::fs::chown(path, Some(uid), Some(gid)) {
                tracing::warn!(
                    "failed to restore ownership of {}: {}",
                    path.display(),
                    e
                );
            }
        }
        Err(reason) => {
            tracing::warn!(
                "cannot restore ownership of {}: {}",
                path.display(),
                reason
            );
        }
    }
}

#[cfg(not(unix))]
fn remediate_sudo_ownership(_path: &Path) {}

#[cfg(unix)]
fn sudo_ids() -> std::result::Result<(u32, u32), String> {
    let uid = parse_id_var("SUDO_UID")?;
    let gid = parse_id_var("SUDO_GID")?;
    Ok((uid, gid))
}

#[cfg(unix)]
fn parse_id_var(var: &str) -> std::result::Result<u32, String> {
    std::env::var(var)
        .map_err(|e| format!("{var}: {e}"))?
        .parse::<u32>()
        .map_err(|e| format!("{var}: {e}"))
}

/// Block in the OS until the exclusive lock is held.
#[cfg(unix)]
fn wait_exclusive(file: &File, _delay: Duration) -> io::Result<()> {
    file.lock_exclusive()
}

/// Poll until the exclusive lock is held, re-checking every `delay`.
#[cfg(not(unix))]
fn wait_exclusive(file: &File, delay: Duration) -> io::Result<()> {
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if is_contended(&e) => std::thread::sleep(delay),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(not(unix))]
fn is_contended(err: &io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn test_lock_name(tag: &str) -> LockName {
        LockName::resolve(
            Some("pmtest"),
            &format!("flock-{}-{tag}", std::process::id()),
        )
    }

    #[test]
    fn lock_path_is_rooted_in_temp_dir() {
        let name = LockName::resolve(Some("pmtest"), "anything");
        let path = lock_path(&name);
        assert!(path.starts_with(std::env::temp_dir()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(name.as_str())
        );
    }

    #[test]
    fn acquire_creates_the_backing_file() -> Result<()> {
        let name = test_lock_name("create");
        let guard = acquire(&name, Duration::from_millis(25))?;
        assert!(guard.path().exists());
        guard.release();
        Ok(())
    }

    #[test]
    fn reacquire_succeeds_after_release() -> Result<()> {
        let name = test_lock_name("reacquire");
        let first = acquire(&name, Duration::from_millis(25))?;
        first.release();
        let second = acquire(&name, Duration::from_millis(25))?;
        second.release();
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn sudo_markers_trigger_chown_to_invoking_user() -> io::Result<()> {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sudo.lock");
        File::create(&path)?;
        let meta = std::fs::metadata(&path)?;

        // Chown to the ids the file already has; succeeds without privileges.
        std::env::set_var("SUDO_COMMAND", "/usr/bin/procmutex");
        std::env::set_var("SUDO_UID", meta.uid().to_string());
        std::env::set_var("SUDO_GID", meta.gid().to_string());
        remediate_sudo_ownership(&path);
        std::env::remove_var("SUDO_COMMAND");
        std::env::remove_var("SUDO_UID");
        std::env::remove_var("SUDO_GID");

        let after = std::fs::metadata(&path)?;
        assert_eq!(after.uid(), meta.uid());
        assert_eq!(after.gid(), meta.gid());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn unparsable_sudo_ids_do_not_stop_acquisition() -> Result<()> {
        std::env::set_var("SUDO_COMMAND", "/usr/bin/procmutex");
        std::env::set_var("SUDO_UID", "not-a-number");
        std::env::set_var("SUDO_GID", "also-not");

        let name = test_lock_name("bad-sudo");
        let result = acquire(&name, Duration::from_millis(25));

        std::env::remove_var("SUDO_COMMAND");
        std::env::remove_var("SUDO_UID");
        std::env::remove_var("SUDO_GID");

        let guard = result?;
        guard.release();
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn absent_sudo_markers_are_ignored() {
        std::env::remove_var("SUDO_COMMAND");
        // Must be a no-op even for a path that does not exist.
        remediate_sudo_ownership(Path::new("/nonexistent/procmutex.lock"));
    }
}
