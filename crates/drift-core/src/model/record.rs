//! Content-addressed file records

use drift_fs::Fingerprint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The immutable content of one file body.
///
/// Identity is the fingerprint alone: two records with equal fingerprints are
/// byte-identical. The retained content blob is an in-memory cache and is
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    fingerprint: Fingerprint,
    len: u64,
    #[serde(skip)]
    content: Option<Arc<[u8]>>,
}

impl FileRecord {
    /// Record for a body known only by its digest.
    pub fn new(fingerprint: Fingerprint, len: u64) -> Self {
        Self {
            fingerprint,
            len,
            content: None,
        }
    }

    /// Record for an in-memory body, keeping the bytes.
    pub fn from_content(content: impl Into<Arc<[u8]>>) -> Self {
        let content: Arc<[u8]> = content.into();
        Self {
            fingerprint: Fingerprint::of(&content),
            len: content.len() as u64,
            content: Some(content),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Retained body, if the store kept it.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub(crate) fn without_content(&self) -> Self {
        Self::new(self.fingerprint, self.len)
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for FileRecord {}

impl std::hash::Hash for FileRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}
