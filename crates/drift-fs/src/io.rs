//! Atomic I/O operations with file locking

use crate::{Error, NormalizedPath, Result};
use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Tuning for locked writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to keep retrying a contended lock before giving up
    pub lock_timeout: Duration,
    /// Whether to fsync the temp file before renaming it into place
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

/// Write content atomically to a file with locking.
///
/// Writers serialize on a sibling `<file>.lock`, write a temp file in the same
/// directory and rename it over the target, so readers never observe a
/// partial write.
///
/// # Errors
///
/// Fails on symlinked targets, lock timeout, or any underlying I/O error.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    write_locked(path, content, config, true)
}

/// Like [`write_atomic`], but refuses to replace a file that already exists.
///
/// The existence check runs under the same `<file>.lock`, so of two writers
/// racing for one path exactly one succeeds.
///
/// # Errors
///
/// [`Error::AlreadyExists`] when the target is present, otherwise as
/// [`write_atomic`].
pub fn create_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    write_locked(path, content, config, false)
}

fn write_locked(path: &NormalizedPath, content: &[u8], config: RobustnessConfig, overwrite: bool) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        reject_symlink(parent)?;
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    reject_symlink(&native_path)?;

    let lock_path = native_path.with_file_name(format!(
        "{}.lock",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    ));
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;
    acquire_exclusive(&lock_file, &native_path, config.lock_timeout)?;

    if !overwrite && native_path.exists() {
        debug!(path = %native_path.display(), "Target exists, not replacing");
        unlock(&lock_file, &native_path)?;
        return Err(Error::AlreadyExists { path: native_path });
    }

    let temp_path = native_path.with_file_name(format!(
        ".{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    ));

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    if config.enable_fsync {
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    }
    drop(temp_file);

    if let Err(e) = fs::rename(&temp_path, &native_path) {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
        }
        return Err(Error::io(&native_path, e));
    }

    debug!(path = %native_path.display(), bytes = content.len(), "Wrote file");
    unlock(&lock_file, &native_path)
}

fn unlock(lock_file: &File, target: &Path) -> Result<()> {
    lock_file.unlock().map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with default robustness settings.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Remove a file, treating an already-missing file as success.
pub fn remove_if_exists(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    match fs::remove_file(&native_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

fn reject_symlink(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(Error::SymlinkInPath {
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

fn acquire_exclusive(lock_file: &File, target: &Path, timeout: Duration) -> Result<()> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(250))
        .with_max_elapsed_time(Some(timeout))
        .build();
    let contended = fs2::lock_contended_error().raw_os_error();

    backoff::retry(policy, || {
        lock_file.try_lock_exclusive().map_err(|e| {
            if e.raw_os_error() == contended {
                debug!(path = %target.display(), "Lock contended, retrying");
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .map_err(|e| match e {
        backoff::Error::Transient { .. } => Error::LockTimeout {
            path: target.to_path_buf(),
            timeout,
        },
        backoff::Error::Permanent(_) => Error::LockFailed {
            path: target.to_path_buf(),
        },
    })
}
