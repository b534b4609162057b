//! File-backed change-set archive
//!
//! Layout under the state directory:
//!
//! ```text
//! changesets/
//!   <directory-id>/
//!     00000001.json
//!     00000002.json
//! ```

use super::ChangeSetSink;
use crate::model::{ChangeSet, DirectoryId};
use crate::{Error, Result};
use drift_fs::io::{self, RobustnessConfig};
use drift_fs::NormalizedPath;
use std::fs;
use tracing::{debug, warn};

const ARCHIVE_DIR: &str = "changesets";
const EXTENSION: &str = ".json";

/// Stores each change set as one JSON document, written atomically.
#[derive(Debug, Clone)]
pub struct Archive {
    root: NormalizedPath,
    robustness: RobustnessConfig,
}

impl Archive {
    /// Archive rooted at `<state_dir>/changesets`.
    pub fn new(state_dir: &NormalizedPath) -> Self {
        Self {
            root: state_dir.join(ARCHIVE_DIR),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn directory_path(&self, directory: DirectoryId) -> NormalizedPath {
        self.root.join(&directory.to_string())
    }

    fn version_path(&self, directory: DirectoryId, version: u32) -> NormalizedPath {
        self.directory_path(directory)
            .join(&format!("{version:08}{EXTENSION}"))
    }

    /// Every change set stored for `directory`, ascending by version.
    ///
    /// A directory with nothing archived yields an empty list.
    pub fn load(&self, directory: DirectoryId) -> Result<Vec<ChangeSet>> {
        let dir = self.directory_path(directory).to_native();
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(drift_fs::Error::io(&dir, e).into()),
        };

        let mut change_sets = Vec::new();
        for item in listing {
            let item = item.map_err(|e| drift_fs::Error::io(&dir, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name.ends_with(EXTENSION) {
                continue;
            }
            let path = NormalizedPath::new(item.path());
            let change_set: ChangeSet = serde_json::from_slice(&io::read_bytes(&path)?)?;
            change_sets.push(change_set);
        }
        change_sets.sort_by_key(ChangeSet::version);
        debug!(%directory, versions = change_sets.len(), "Loaded archived change sets");
        Ok(change_sets)
    }

    /// Directories with an archive folder, whether or not it holds versions.
    pub fn directories(&self) -> Result<Vec<DirectoryId>> {
        let root = self.root.to_native();
        let listing = match fs::read_dir(&root) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(drift_fs::Error::io(&root, e).into()),
        };
        let mut ids = Vec::new();
        for item in listing {
            let item = item.map_err(|e| drift_fs::Error::io(&root, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            match name.parse::<DirectoryId>() {
                Ok(id) => ids.push(id),
                Err(_) => warn!(entry = %name, "Ignoring unexpected archive entry"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete the archive folder of a directory with no remaining versions.
    pub fn forget(&self, directory: DirectoryId) -> Result<()> {
        let remaining = self.load(directory)?;
        if !remaining.is_empty() {
            return Err(Error::DirectoryInUse {
                directory,
                versions: remaining.len() as u32,
            });
        }
        let dir = self.directory_path(directory).to_native();
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(drift_fs::Error::io(&dir, e).into()),
        }
    }
}

impl ChangeSetSink for Archive {
    fn persist(&self, change_set: &ChangeSet) -> Result<()> {
        let path = self.version_path(change_set.directory(), change_set.version());
        let json = serde_json::to_vec_pretty(change_set)?;
        // Versions are immutable once written
        match io::create_atomic(&path, &json, self.robustness) {
            Ok(()) => {}
            Err(drift_fs::Error::AlreadyExists { .. }) => {
                warn!(path = %path, "Archived version already exists");
                return Err(Error::VersionConflict {
                    directory: change_set.directory(),
                    version: change_set.version(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path, "Archived change set");
        Ok(())
    }

    fn remove(&self, directory: DirectoryId, version: u32) -> Result<()> {
        let path = self.version_path(directory, version);
        io::remove_if_exists(&path)?;
        io::remove_if_exists(&NormalizedPath::new(format!("{}.lock", path)))?;
        debug!(path = %path, "Removed archived change set");
        Ok(())
    }
}
