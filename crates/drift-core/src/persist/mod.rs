//! Persistence boundary for change sets
//!
//! The chain hands every committed change set to a [`ChangeSetSink`] before
//! it becomes visible, and tells the sink about purged versions. A sink
//! failure aborts the commit with the chain untouched.

mod archive;
pub mod wire;

pub use archive::Archive;

use crate::Result;
use crate::model::{ChangeSet, DirectoryId};

/// Durable storage for committed change sets.
pub trait ChangeSetSink: Send + Sync {
    /// Store a change set that is about to be appended.
    fn persist(&self, change_set: &ChangeSet) -> Result<()>;

    /// Forget a purged version.
    fn remove(&self, directory: DirectoryId, version: u32) -> Result<()>;
}

/// Sink that keeps nothing, for purely in-memory chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ChangeSetSink for NullSink {
    fn persist(&self, _change_set: &ChangeSet) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _directory: DirectoryId, _version: u32) -> Result<()> {
        Ok(())
    }
}
