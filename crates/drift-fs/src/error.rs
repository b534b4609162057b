//! Error types for drift-fs

use std::path::PathBuf;
use std::time::Duration;

/// Result type for drift-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in drift-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} config for {path}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Timed out after {timeout:?} waiting for lock on {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Refusing to replace existing file at {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Refusing to write through symbolic link at {path}")]
    SymlinkInPath { path: PathBuf },

    #[error("Invalid fingerprint '{value}': {reason}")]
    InvalidFingerprint { value: String, reason: String },

    #[error("Path '{path}' escapes its base directory")]
    EscapesBase { path: String },

    #[error("Path is empty after normalization: '{path}'")]
    EmptyPath { path: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
