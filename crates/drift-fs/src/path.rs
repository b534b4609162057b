//! Canonical path handling
//!
//! Two path types are used throughout the drift crates:
//!
//! - [`NormalizedPath`]: an absolute base directory, forward-slash separated
//!   with dot segments resolved.
//! - [`RelativePath`]: a file location inside a monitored directory. It never
//!   starts or ends with a separator, never contains `.`/`..` or empty
//!   segments, and orders byte-wise so sorted output is locale independent.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory value reported for files that sit directly in the base
pub const ROOT_DIRECTORY: &str = ".";

/// A path normalized to use forward slashes internally.
///
/// Converted to platform-native form only at I/O boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath, converting separators and resolving
    /// `.`/`..` segments.
    ///
    /// `..` at the start of a relative path is dropped; on an absolute path
    /// it stops at the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self { inner: clean(&raw) }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || has_drive_prefix(&self.inner)
    }

    /// Join this path with a segment, resolving dot segments.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        if segment.is_empty() {
            return self.clone();
        }
        Self::new(format!("{}/{}", self.inner, segment))
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) if idx > 0 => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx + 1..]) }
        })
    }

    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Resolve a walker-supplied location against this base.
    ///
    /// Absolute inputs must lie under the base; relative inputs must not
    /// climb out of it.
    ///
    /// # Errors
    ///
    /// [`Error::EscapesBase`] when the location resolves outside the base,
    /// [`Error::EmptyPath`] when it names the base itself.
    pub fn relativize(&self, raw: &str) -> Result<RelativePath> {
        let unified = raw.replace('\\', "/");
        let candidate = NormalizedPath {
            inner: unified.clone(),
        };
        if !candidate.is_absolute() {
            return RelativePath::parse(&unified);
        }
        let absolute = clean(&unified);
        let base = self.inner.trim_end_matches('/');
        match absolute.strip_prefix(base) {
            Some(rest) if rest.is_empty() => Err(Error::EmptyPath {
                path: raw.to_string(),
            }),
            Some(rest) if rest.starts_with('/') || base.is_empty() => {
                RelativePath::parse(rest.trim_start_matches('/'))
            }
            _ => Err(Error::EscapesBase {
                path: raw.to_string(),
            }),
        }
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl From<NormalizedPath> for String {
    fn from(p: NormalizedPath) -> Self {
        p.inner
    }
}

/// Location of a file relative to its monitored directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath {
    inner: String,
}

impl RelativePath {
    /// Canonicalize a relative location.
    ///
    /// Separators are unified, `.` and empty segments dropped and `..`
    /// resolved. Unlike [`NormalizedPath::new`], a `..` that would leave the
    /// base is an error rather than silently discarded.
    pub fn parse(raw: &str) -> Result<Self> {
        let unified = raw.replace('\\', "/");
        if unified.chars().all(|c| c == '/') {
            return Err(Error::EmptyPath {
                path: raw.to_string(),
            });
        }
        if unified.starts_with('/') {
            return Err(Error::EscapesBase {
                path: raw.to_string(),
            });
        }
        let mut segments: Vec<&str> = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(Error::EscapesBase {
                            path: raw.to_string(),
                        });
                    }
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(Error::EmptyPath {
                path: raw.to_string(),
            });
        }
        Ok(Self {
            inner: segments.join("/"),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Parent directory, or `"."` for entries directly under the base.
    pub fn directory(&self) -> &str {
        match self.inner.rfind('/') {
            Some(idx) => &self.inner[..idx],
            None => ROOT_DIRECTORY,
        }
    }

    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or(&self.inner)
    }

    /// Whether this path lies inside `directory` at any depth.
    pub fn is_within(&self, directory: &str) -> bool {
        let directory = directory.trim_end_matches('/');
        if directory.is_empty() || directory == ROOT_DIRECTORY {
            return true;
        }
        self.inner
            .strip_prefix(directory)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Native path of this file under `base`.
    pub fn under(&self, base: &NormalizedPath) -> PathBuf {
        base.join(&self.inner).to_native()
    }
}

impl TryFrom<String> for RelativePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<RelativePath> for String {
    fn from(p: RelativePath) -> Self {
        p.inner
    }
}

impl std::fmt::Display for RelativePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Collapse separators and resolve dot segments of a forward-slash path.
fn clean(path: &str) -> String {
    let is_network = path.starts_with("//") && !path.starts_with("///");
    let is_absolute = path.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    if is_network {
        format!("//{}", body)
    } else if is_absolute {
        format!("/{}", body)
    } else {
        body
    }
}
