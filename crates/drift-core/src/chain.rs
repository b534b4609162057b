//! Versioned change-set chains
//!
//! Each monitored directory owns one chain of change sets numbered 1..=N with
//! no gaps. The chain also keeps the materialized state: the file set obtained
//! by rolling every change set forward from the empty baseline, which is what
//! the next scan is diffed against.
//!
//! Commits and purges for one directory are serialized through a
//! [`CommitGuard`]. A second writer arriving while a guard is held gets
//! [`Error::Busy`] immediately instead of blocking; retrying is the caller's
//! decision. Readers never wait on writers beyond the short critical section
//! in which a change set is appended.

use crate::diff::diff;
use crate::filter::{AcceptAll, PathFilter};
use crate::model::{ChangeSet, DirectoryId};
use crate::persist::{ChangeSetSink, NullSink};
use crate::scan::Snapshot;
use crate::store::FileRecordStore;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct ChainState {
    directory: DirectoryId,
    filter: Arc<dyn PathFilter>,
    change_sets: Vec<Arc<ChangeSet>>,
    current: Snapshot,
    /// Triggering scan id to the version it produced
    scans: HashMap<Uuid, u32>,
}

impl ChainState {
    fn new(directory: DirectoryId, filter: Arc<dyn PathFilter>) -> Self {
        Self {
            directory,
            filter,
            change_sets: Vec::new(),
            current: Snapshot::new(directory),
            scans: HashMap::new(),
        }
    }

    fn latest(&self) -> u32 {
        self.change_sets.len() as u32
    }

    fn version(&self, version: u32) -> Result<&Arc<ChangeSet>> {
        version
            .checked_sub(1)
            .and_then(|idx| self.change_sets.get(idx as usize))
            .ok_or(Error::VersionNotFound {
                directory: self.directory,
                version,
                latest: self.latest(),
            })
    }

    /// Replay change sets 1..=version onto the empty baseline.
    fn materialize(&self, version: u32) -> Result<Snapshot> {
        if version > self.latest() {
            return Err(Error::VersionNotFound {
                directory: self.directory,
                version,
                latest: self.latest(),
            });
        }
        if version == self.latest() {
            return Ok(self.current.clone());
        }
        let mut snapshot = Snapshot::new(self.directory);
        for change_set in &self.change_sets[..version as usize] {
            for entry in change_set.entries() {
                snapshot.apply(entry);
            }
        }
        let at = match version {
            0 => snapshot.captured_at(),
            v => self.change_sets[v as usize - 1].created_at(),
        };
        Ok(snapshot.stamped(at))
    }
}

struct ChainSlot {
    in_flight: AtomicBool,
    state: Mutex<ChainState>,
}

/// Lifecycle of one directory's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainStatus {
    /// Tracked, nothing committed yet
    Uninitialized,
    /// At least one change set
    Active { latest: u32 },
}

/// Point-in-time, restartable view of a chain, ascending by version.
#[derive(Debug, Clone)]
pub struct History {
    directory: DirectoryId,
    change_sets: Vec<Arc<ChangeSet>>,
}

impl History {
    pub fn directory(&self) -> DirectoryId {
        self.directory
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeSet> + '_ {
        self.change_sets.iter().map(|cs| &**cs)
    }

    pub fn len(&self) -> usize {
        self.change_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }

    pub fn latest(&self) -> Option<&ChangeSet> {
        self.change_sets.last().map(|cs| &**cs)
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a ChangeSet;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Arc<ChangeSet>>, fn(&'a Arc<ChangeSet>) -> &'a ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        let deref: fn(&'a Arc<ChangeSet>) -> &'a ChangeSet = |cs| &**cs;
        self.change_sets.iter().map(deref)
    }
}

/// Summary of a tail purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub directory: DirectoryId,
    /// Removed versions, newest first
    pub removed: Vec<u32>,
    /// Record references given back to the store
    pub released: usize,
    /// Latest remaining version, 0 when the chain is empty again
    pub latest: u32,
}

/// Exclusive right to append to (or purge) one directory's chain.
///
/// Dropping the guard releases it.
pub struct CommitGuard<'a> {
    chain: &'a ChangeSetChain,
    slot: Arc<ChainSlot>,
}

impl CommitGuard<'_> {
    /// Diff `snapshot` against the materialized state and append the result
    /// as the next version.
    ///
    /// Committing a snapshot whose scan was already committed returns the
    /// change set produced the first time.
    ///
    /// # Errors
    ///
    /// - [`Error::DirectoryMismatch`] if the snapshot belongs elsewhere
    /// - any sink error, in which case nothing changed
    pub fn commit(&self, snapshot: &Snapshot) -> Result<Arc<ChangeSet>> {
        let mut state = self.slot.state.lock();
        if snapshot.directory() != state.directory {
            return Err(Error::DirectoryMismatch {
                expected: state.directory,
                actual: snapshot.directory(),
            });
        }
        if let Some(&version) = state.scans.get(&snapshot.scan_id()) {
            debug!(directory = %state.directory, version, "Scan already committed");
            return state.version(version).cloned();
        }

        let previous = (!state.change_sets.is_empty()).then_some(&state.current);
        let entries = diff(previous, snapshot, state.filter.as_ref());
        let version = state.latest() + 1;
        let change_set = ChangeSet::new(state.directory, version, snapshot.scan_id(), entries);

        self.chain.sink.persist(&change_set)?;

        for record in change_set.entries().iter().flat_map(|e| e.records()) {
            self.chain.store.retain(record);
        }
        for entry in change_set.entries() {
            state.current.apply(entry);
        }
        let directory = state.directory;
        let current = std::mem::replace(&mut state.current, Snapshot::new(directory));
        state.current = current.stamped(change_set.created_at());
        state.scans.insert(change_set.scan_id(), version);

        let counts = change_set.counts();
        info!(
            directory = %state.directory,
            version,
            added = counts.added,
            changed = counts.changed,
            removed = counts.removed,
            "Committed change set"
        );
        let change_set = Arc::new(change_set);
        state.change_sets.push(Arc::clone(&change_set));
        Ok(change_set)
    }

    /// Latest committed version at this moment.
    pub fn latest_version(&self) -> u32 {
        self.slot.state.lock().latest()
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.slot.in_flight.store(false, Ordering::Release);
    }
}

/// All chains, sharing one record store and one sink.
pub struct ChangeSetChain {
    chains: RwLock<HashMap<DirectoryId, Arc<ChainSlot>>>,
    store: Arc<FileRecordStore>,
    sink: Arc<dyn ChangeSetSink>,
}

impl ChangeSetChain {
    pub fn new(store: Arc<FileRecordStore>, sink: Arc<dyn ChangeSetSink>) -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            store,
            sink,
        }
    }

    /// Chains that persist nothing.
    pub fn in_memory(store: Arc<FileRecordStore>) -> Self {
        Self::new(store, Arc::new(NullSink))
    }

    pub fn store(&self) -> &Arc<FileRecordStore> {
        &self.store
    }

    /// Start tracking a directory. Tracking an already tracked directory is a
    /// no-op; its filter is fixed for the lifetime of the chain.
    pub fn track(&self, directory: DirectoryId, filter: Arc<dyn PathFilter>) {
        self.chains.write().entry(directory).or_insert_with(|| {
            debug!(%directory, "Tracking directory");
            Arc::new(ChainSlot {
                in_flight: AtomicBool::new(false),
                state: Mutex::new(ChainState::new(directory, filter)),
            })
        });
    }

    /// Stop tracking a directory whose chain is empty.
    ///
    /// # Errors
    ///
    /// [`Error::DirectoryInUse`] while change sets remain.
    pub fn untrack(&self, directory: DirectoryId) -> Result<()> {
        let mut chains = self.chains.write();
        let slot = chains
            .get(&directory)
            .ok_or_else(|| Error::directory_not_found(directory))?;
        let versions = slot.state.lock().latest();
        if versions > 0 {
            return Err(Error::DirectoryInUse { directory, versions });
        }
        chains.remove(&directory);
        Ok(())
    }

    pub fn is_tracked(&self, directory: DirectoryId) -> bool {
        self.chains.read().contains_key(&directory)
    }

    pub fn directories(&self) -> Vec<DirectoryId> {
        let mut ids: Vec<_> = self.chains.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn slot(&self, directory: DirectoryId) -> Result<Arc<ChainSlot>> {
        self.chains
            .read()
            .get(&directory)
            .cloned()
            .ok_or_else(|| Error::directory_not_found(directory))
    }

    /// Take the commit lock for `directory` without blocking.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if a commit or purge is already in flight.
    pub fn begin(&self, directory: DirectoryId) -> Result<CommitGuard<'_>> {
        let slot = self.slot(directory)?;
        if slot
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!(%directory, "Commit rejected, chain busy");
            return Err(Error::Busy { directory });
        }
        Ok(CommitGuard { chain: self, slot })
    }

    /// Commit a snapshot to its directory's chain in one step.
    pub fn commit(&self, snapshot: &Snapshot) -> Result<Arc<ChangeSet>> {
        self.begin(snapshot.directory())?.commit(snapshot)
    }

    pub fn history(&self, directory: DirectoryId) -> Result<History> {
        let slot = self.slot(directory)?;
        let state = slot.state.lock();
        Ok(History {
            directory,
            change_sets: state.change_sets.clone(),
        })
    }

    pub fn latest_version(&self, directory: DirectoryId) -> Result<u32> {
        Ok(self.slot(directory)?.state.lock().latest())
    }

    pub fn status(&self, directory: DirectoryId) -> Result<ChainStatus> {
        Ok(match self.latest_version(directory)? {
            0 => ChainStatus::Uninitialized,
            latest => ChainStatus::Active { latest },
        })
    }

    /// # Errors
    ///
    /// [`Error::VersionNotFound`] outside 1..=latest.
    pub fn change_set(&self, directory: DirectoryId, version: u32) -> Result<Arc<ChangeSet>> {
        let slot = self.slot(directory)?;
        let state = slot.state.lock();
        state.version(version).cloned()
    }

    /// Materialized state after the latest version.
    pub fn current_state(&self, directory: DirectoryId) -> Result<Snapshot> {
        Ok(self.slot(directory)?.state.lock().current.clone())
    }

    /// Materialized state after `version`; version 0 is the empty baseline.
    pub fn snapshot_at(&self, directory: DirectoryId, version: u32) -> Result<Snapshot> {
        self.slot(directory)?.state.lock().materialize(version)
    }

    /// Delete versions latest down to `through`, inclusive.
    ///
    /// Every record reference held by the purged entries is released and the
    /// materialized state rewinds to version `through - 1`. If the sink fails
    /// part way, the versions already removed stay removed and the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`Error::PurgeOrder`] unless `through` lies in 1..=latest
    /// - [`Error::Busy`] while a commit is in flight
    pub fn purge_tail(&self, directory: DirectoryId, through: u32) -> Result<PurgeReport> {
        let guard = self.begin(directory)?;
        let mut state = guard.slot.state.lock();
        let latest = state.latest();
        if through == 0 || through > latest {
            return Err(Error::PurgeOrder {
                directory,
                requested: through,
                latest,
            });
        }

        let mut report = PurgeReport {
            directory,
            removed: Vec::new(),
            released: 0,
            latest,
        };
        while state.latest() >= through {
            let version = state.latest();
            self.sink.remove(directory, version)?;
            let Some(change_set) = state.change_sets.pop() else {
                break;
            };
            for entry in change_set.entries().iter().rev() {
                state.current.revert(entry);
                for record in entry.records() {
                    if let Err(e) = self.store.release(&record.fingerprint()) {
                        warn!(%directory, version, error = %e, "Purged entry referenced an unknown record");
                        continue;
                    }
                    report.released += 1;
                }
            }
            state.scans.remove(&change_set.scan_id());
            report.removed.push(version);
            report.latest = state.latest();
        }

        let at = state
            .change_sets
            .last()
            .map(|cs| cs.created_at())
            .unwrap_or_else(|| state.current.captured_at());
        let current = std::mem::replace(&mut state.current, Snapshot::new(directory));
        state.current = current.stamped(at);

        info!(%directory, through, latest = report.latest, "Purged change sets");
        Ok(report)
    }

    /// Rebuild a chain from persisted change sets, retaining their records.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptChain`] if the versions are not exactly 1..=N or a
    /// change set belongs to another directory.
    pub fn restore(
        &self,
        directory: DirectoryId,
        filter: Arc<dyn PathFilter>,
        mut change_sets: Vec<ChangeSet>,
    ) -> Result<()> {
        change_sets.sort_by_key(ChangeSet::version);
        for (idx, change_set) in change_sets.iter().enumerate() {
            let expected = idx as u32 + 1;
            if change_set.version() != expected {
                return Err(Error::CorruptChain {
                    directory,
                    reason: format!("expected version {expected}, found {}", change_set.version()),
                });
            }
            if change_set.directory() != directory {
                return Err(Error::CorruptChain {
                    directory,
                    reason: format!("version {expected} belongs to {}", change_set.directory()),
                });
            }
        }

        let mut state = ChainState::new(directory, filter);
        for change_set in change_sets {
            for entry in change_set.entries() {
                for record in entry.records() {
                    self.store.retain(record);
                }
                state.current.apply(entry);
            }
            state.scans.insert(change_set.scan_id(), change_set.version());
            state.change_sets.push(Arc::new(change_set));
        }
        debug!(%directory, versions = state.latest(), "Restored chain");

        self.chains.write().insert(
            directory,
            Arc::new(ChainSlot {
                in_flight: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
        );
        Ok(())
    }
}

impl Default for ChangeSetChain {
    fn default() -> Self {
        Self::in_memory(Arc::new(FileRecordStore::default()))
    }
}

impl std::fmt::Debug for ChangeSetChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSetChain")
            .field("directories", &self.chains.read().len())
            .field("store", &self.store)
            .finish()
    }
}

/// Filter used when a chain is tracked without one.
pub fn accept_all() -> Arc<dyn PathFilter> {
    Arc::new(AcceptAll)
}
