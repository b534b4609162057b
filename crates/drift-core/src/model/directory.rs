//! Monitored directories

use crate::filter::DirectoryFilter;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use drift_fs::NormalizedPath;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a (resource, base path) pair under drift surveillance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryId(Uuid);

impl DirectoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DirectoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DirectoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A directory on a managed resource whose files are tracked for drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredDirectory {
    /// Stable identifier referenced by every change set of the chain
    pub id: DirectoryId,
    /// Human-readable definition name, unique per registry
    pub name: String,
    /// The managed resource (server, application, host) owning the files
    pub resource_id: String,
    /// Absolute base path all snapshot paths are relative to
    pub base_path: NormalizedPath,
    /// When monitoring was enabled
    pub created_at: DateTime<Utc>,
    /// Include/exclude rules supplied by discovery configuration
    #[serde(default)]
    pub filter: DirectoryFilter,
}

impl MonitoredDirectory {
    /// Define a new monitored directory with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDirectory`] if the name is blank or the base
    /// path is not absolute.
    pub fn new(
        name: impl Into<String>,
        resource_id: impl Into<String>,
        base_path: impl Into<NormalizedPath>,
    ) -> Result<Self> {
        let name = name.into();
        let base_path = base_path.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidDirectory {
                name,
                reason: "name must not be empty".into(),
            });
        }
        if !base_path.is_absolute() {
            return Err(Error::InvalidDirectory {
                name,
                reason: format!("base path '{}' is not absolute", base_path),
            });
        }
        Ok(Self {
            id: DirectoryId::new(),
            name,
            resource_id: resource_id.into(),
            base_path,
            created_at: Utc::now(),
            filter: DirectoryFilter::default(),
        })
    }

    pub fn with_filter(mut self, filter: DirectoryFilter) -> Self {
        self.filter = filter;
        self
    }
}
