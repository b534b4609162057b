//! Error types for drift-core

use crate::model::DirectoryId;
use drift_fs::Fingerprint;
use std::path::PathBuf;

/// Result type for drift-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in drift-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The base path of a monitored directory could not be read
    #[error("Cannot scan {directory}: base path {base} is unreadable: {source}")]
    Scan {
        directory: DirectoryId,
        base: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scan was cancelled before it could be committed
    #[error("Scan of {directory} was cancelled")]
    Cancelled { directory: DirectoryId },

    /// Another commit or purge holds the chain for this directory
    #[error("A commit is already in flight for {directory}")]
    Busy { directory: DirectoryId },

    /// A purge would leave a gap in the chain
    #[error("Cannot purge {directory} through version {requested}: latest version is {latest}")]
    PurgeOrder {
        directory: DirectoryId,
        requested: u32,
        latest: u32,
    },

    /// Unknown monitored directory
    #[error("Monitored directory not found: {directory}")]
    DirectoryNotFound { directory: String },

    /// Unknown file record
    #[error("File record not found: {fingerprint}")]
    FingerprintNotFound { fingerprint: Fingerprint },

    /// Version outside the chain
    #[error("Version {version} not found for {directory} (latest is {latest})")]
    VersionNotFound {
        directory: DirectoryId,
        version: u32,
        latest: u32,
    },

    /// Query range runs backwards
    #[error("Invalid version range {from}..{to} for {directory}")]
    InvalidRange {
        directory: DirectoryId,
        from: u32,
        to: u32,
    },

    /// Drift entry violates the category/old/new invariants
    #[error("Invalid drift entry for {path}: {reason}")]
    InvalidEntry { path: String, reason: String },

    /// Directory cannot be removed while its chain has change sets
    #[error("Monitored directory {directory} still has {versions} change sets")]
    DirectoryInUse { directory: DirectoryId, versions: u32 },

    /// Directory name collides with an existing registration
    #[error("A monitored directory named '{name}' is already registered")]
    DuplicateDirectory { name: String },

    /// Directory definition is unusable
    #[error("Invalid monitored directory '{name}': {reason}")]
    InvalidDirectory { name: String, reason: String },

    /// Glob pattern failed to compile
    #[error("Invalid filter pattern '{pattern}': {message}")]
    InvalidFilter { pattern: String, message: String },

    /// Snapshot was handed to the wrong chain
    #[error("Snapshot of {actual} cannot be committed to {expected}")]
    DirectoryMismatch {
        expected: DirectoryId,
        actual: DirectoryId,
    },

    /// Persisted chain does not form a contiguous version sequence
    #[error("Change set chain for {directory} is corrupt: {reason}")]
    CorruptChain { directory: DirectoryId, reason: String },

    /// Another process already archived this version
    #[error("Version {version} of {directory} was already written by another writer; reopen the state directory")]
    VersionConflict { directory: DirectoryId, version: u32 },

    /// Change-set file could not be parsed
    #[error("Malformed change set file at line {line}: {reason}")]
    MalformedChangeSet { line: usize, reason: String },

    // Transparent wrappers for underlying errors
    /// Filesystem error from drift-fs
    #[error(transparent)]
    Fs(#[from] drift_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn directory_not_found(directory: impl std::fmt::Display) -> Self {
        Self::DirectoryNotFound {
            directory: directory.to_string(),
        }
    }

    /// Whether retrying the same call shortly may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy { .. } | Self::Fs(drift_fs::Error::LockTimeout { .. })
        )
    }
}
