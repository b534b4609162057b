//! Drift monitor service
//!
//! [`DriftMonitor`] ties the pieces together for one state directory:
//!
//! ```text
//! <state>/
//!   drift.toml          DriftConfig
//!   directories.toml    registry of monitored directories
//!   changesets/         Archive
//! ```
//!
//! Scans run outside the commit lock. Commits rejected as busy are retried
//! with exponential backoff using the `[commit]` settings.

use crate::chain::{ChangeSetChain, PurgeReport};
use crate::config::DriftConfig;
use crate::model::{ChangeSet, DirectoryId, MonitoredDirectory};
use crate::persist::wire::{self, ChangeSetHeaders};
use crate::persist::{Archive, ChangeSetSink, NullSink};
use crate::query::QueryFacade;
use crate::scan::{FileWalker, SkippedPath, Snapshot, SnapshotScanner};
use crate::store::{CollectStats, FileRecordStore};
use crate::{Error, Result};
use drift_fs::{ConfigStore, NormalizedPath};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// File name of the directory registry inside a state directory
pub const REGISTRY_FILE: &str = "directories.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Registry {
    #[serde(default)]
    directories: Vec<MonitoredDirectory>,
}

/// Result of scanning and committing one directory.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub directory: DirectoryId,
    pub change_set: Arc<ChangeSet>,
    pub skipped: Vec<SkippedPath>,
}

/// Per-directory results of a scan cycle, in registry order.
pub type CycleReport = Vec<(DirectoryId, Result<ScanReport>)>;

/// Registry, shared record store and change-set chains of one installation.
pub struct DriftMonitor {
    config: DriftConfig,
    state_dir: Option<NormalizedPath>,
    registry: RwLock<BTreeMap<DirectoryId, MonitoredDirectory>>,
    store: Arc<FileRecordStore>,
    chain: Arc<ChangeSetChain>,
    archive: Option<Arc<Archive>>,
    /// In-flight scans per directory, keyed by ticket
    active_scans: Mutex<HashMap<DirectoryId, Vec<(u64, CancellationToken)>>>,
    next_ticket: AtomicU64,
}

/// Registration of one in-flight scan; removes exactly itself on drop.
struct ActiveScan<'a> {
    monitor: &'a DriftMonitor,
    directory: DirectoryId,
    ticket: u64,
}

impl Drop for ActiveScan<'_> {
    fn drop(&mut self) {
        let mut active = self.monitor.active_scans.lock();
        if let Some(scans) = active.get_mut(&self.directory) {
            scans.retain(|(ticket, _)| *ticket != self.ticket);
            if scans.is_empty() {
                active.remove(&self.directory);
            }
        }
    }
}

impl DriftMonitor {
    /// Monitor that persists nothing.
    pub fn in_memory(config: DriftConfig) -> Self {
        let store = Arc::new(FileRecordStore::new(config.store));
        let sink: Arc<dyn ChangeSetSink> = Arc::new(NullSink);
        Self {
            chain: Arc::new(ChangeSetChain::new(Arc::clone(&store), sink)),
            config,
            state_dir: None,
            registry: RwLock::new(BTreeMap::new()),
            store,
            archive: None,
            active_scans: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Open (or initialize) the state directory and restore every chain.
    ///
    /// # Errors
    ///
    /// Fails on unreadable configuration or a corrupt archive.
    pub fn open(state_dir: impl Into<NormalizedPath>) -> Result<Self> {
        let state_dir = state_dir.into();
        let config = DriftConfig::load(&state_dir)?;
        let registry: Registry = ConfigStore::new().load_or_default(&state_dir.join(REGISTRY_FILE))?;

        let store = Arc::new(FileRecordStore::new(config.store));
        let archive = Arc::new(Archive::new(&state_dir));
        let sink: Arc<dyn ChangeSetSink> = archive.clone();
        let chain = Arc::new(ChangeSetChain::new(Arc::clone(&store), sink));

        let mut directories = BTreeMap::new();
        for directory in registry.directories {
            let change_sets = archive.load(directory.id)?;
            chain.restore(directory.id, Arc::new(directory.filter.clone()), change_sets)?;
            directories.insert(directory.id, directory);
        }
        for orphan in archive.directories()?.into_iter().filter(|id| !directories.contains_key(id)) {
            warn!(directory = %orphan, "Archive holds change sets for an unregistered directory");
        }
        info!(state = %state_dir, directories = directories.len(), "Opened drift state");

        Ok(Self {
            config,
            state_dir: Some(state_dir),
            registry: RwLock::new(directories),
            store,
            chain,
            archive: Some(archive),
            active_scans: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn state_dir(&self) -> Option<&NormalizedPath> {
        self.state_dir.as_ref()
    }

    pub fn store(&self) -> &Arc<FileRecordStore> {
        &self.store
    }

    pub fn chain(&self) -> &Arc<ChangeSetChain> {
        &self.chain
    }

    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(Arc::clone(&self.chain))
    }

    fn save_registry(&self, registry: &BTreeMap<DirectoryId, MonitoredDirectory>) -> Result<()> {
        let Some(state_dir) = &self.state_dir else {
            return Ok(());
        };
        let file = Registry {
            directories: registry.values().cloned().collect(),
        };
        ConfigStore::new().save(&state_dir.join(REGISTRY_FILE), &file)?;
        Ok(())
    }

    /// Start monitoring a directory.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDirectory`] if the name is already registered.
    pub fn register(&self, directory: MonitoredDirectory) -> Result<DirectoryId> {
        let mut registry = self.registry.write();
        if registry.values().any(|d| d.name == directory.name) {
            return Err(Error::DuplicateDirectory { name: directory.name });
        }
        let id = directory.id;
        self.chain.track(id, Arc::new(directory.filter.clone()));
        info!(%id, name = %directory.name, base = %directory.base_path, "Registered monitored directory");
        registry.insert(id, directory);
        if let Err(e) = self.save_registry(&registry) {
            registry.remove(&id);
            let _ = self.chain.untrack(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Stop monitoring a directory whose chain has been purged.
    ///
    /// # Errors
    ///
    /// [`Error::DirectoryInUse`] while change sets remain.
    pub fn unregister(&self, id: DirectoryId) -> Result<MonitoredDirectory> {
        let mut registry = self.registry.write();
        if !registry.contains_key(&id) {
            return Err(Error::directory_not_found(id));
        }
        self.chain.untrack(id)?;
        if let Some(archive) = &self.archive {
            archive.forget(id)?;
        }
        let directory = registry.remove(&id).ok_or_else(|| Error::directory_not_found(id))?;
        self.save_registry(&registry)?;
        info!(%id, name = %directory.name, "Unregistered monitored directory");
        Ok(directory)
    }

    pub fn directory(&self, id: DirectoryId) -> Result<MonitoredDirectory> {
        self.registry
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::directory_not_found(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<MonitoredDirectory> {
        self.registry.read().values().find(|d| d.name == name).cloned()
    }

    /// Look a directory up by name, falling back to its id.
    pub fn resolve(&self, name_or_id: &str) -> Result<MonitoredDirectory> {
        if let Some(directory) = self.find_by_name(name_or_id) {
            return Ok(directory);
        }
        match name_or_id.parse::<DirectoryId>() {
            Ok(id) => self.directory(id),
            Err(_) => Err(Error::directory_not_found(name_or_id)),
        }
    }

    pub fn directories(&self) -> Vec<MonitoredDirectory> {
        self.registry.read().values().cloned().collect()
    }

    /// Scan one directory and commit the result.
    ///
    /// The scan can be cancelled through `cancel` or [`Self::cancel_scan`]
    /// until the commit starts; a cancelled scan leaves the chain untouched.
    pub fn scan(&self, id: DirectoryId, walker: &dyn FileWalker, cancel: &CancellationToken) -> Result<ScanReport> {
        let directory = self.directory(id)?;
        let token = cancel.child_token();
        let _active = self.track_scan(id, token.clone());
        self.scan_and_commit(&directory, walker, &token)
    }

    fn track_scan(&self, directory: DirectoryId, token: CancellationToken) -> ActiveScan<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.active_scans
            .lock()
            .entry(directory)
            .or_default()
            .push((ticket, token));
        ActiveScan {
            monitor: self,
            directory,
            ticket,
        }
    }

    fn scan_and_commit(
        &self,
        directory: &MonitoredDirectory,
        walker: &dyn FileWalker,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let outcome = SnapshotScanner::new(Arc::clone(&self.store)).scan(directory, walker, cancel)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                directory: directory.id,
            });
        }
        let change_set = self.commit_with_retry(&outcome.snapshot)?;
        Ok(ScanReport {
            directory: directory.id,
            change_set,
            skipped: outcome.skipped,
        })
    }

    /// Commit, retrying with backoff while the chain is busy.
    pub fn commit_with_retry(&self, snapshot: &Snapshot) -> Result<Arc<ChangeSet>> {
        backoff::retry(self.config.commit.backoff(), || {
            self.chain.commit(snapshot).map_err(|e| {
                if e.is_retryable() {
                    debug!(directory = %snapshot.directory(), "Commit busy, backing off");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .map_err(|e| match e {
            backoff::Error::Permanent(e) => e,
            backoff::Error::Transient { err, .. } => err,
        })
    }

    /// Signal every in-flight scan of `id`, returning whether any was
    /// running.
    pub fn cancel_scan(&self, id: DirectoryId) -> bool {
        match self.active_scans.lock().get(&id) {
            Some(scans) => {
                for (_, token) in scans {
                    token.cancel();
                }
                !scans.is_empty()
            }
            None => false,
        }
    }

    /// Scan every registered directory, running up to `[scan] workers`
    /// scoped threads at a time.
    pub fn run_cycle(&self, walker: &dyn FileWalker, cancel: &CancellationToken) -> CycleReport {
        let ids: Vec<DirectoryId> = self.registry.read().keys().copied().collect();
        let workers = self.config.scan.workers.max(1);
        let mut report = Vec::with_capacity(ids.len());

        for batch in ids.chunks(workers) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&id| (id, scope.spawn(move || self.scan(id, walker, cancel))))
                    .collect();
                for (id, handle) in handles {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err(std::io::Error::other(format!("scan worker for {id} panicked")).into()));
                    report.push((id, result));
                }
            });
        }
        let failed = report.iter().filter(|(_, r)| r.is_err()).count();
        info!(directories = report.len(), failed, "Scan cycle finished");
        report
    }

    pub fn purge(&self, id: DirectoryId, through: u32) -> Result<PurgeReport> {
        self.chain.purge_tail(id, through)
    }

    pub fn collect_garbage(&self) -> CollectStats {
        self.store.collect()
    }

    /// Render a stored change set in the agent file format.
    pub fn export_change_set(&self, id: DirectoryId, version: u32) -> Result<String> {
        let directory = self.directory(id)?;
        let change_set = self.chain.change_set(id, version)?;
        wire::render(
            &ChangeSetHeaders::for_change_set(&directory, &change_set),
            change_set.entries(),
        )
    }
}

impl std::fmt::Debug for DriftMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftMonitor")
            .field("state_dir", &self.state_dir)
            .field("directories", &self.registry.read().len())
            .field("chain", &self.chain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DriftCategory;
    use crate::scan::{FeedWalker, WalkEntry};
    use pretty_assertions::assert_eq;

    fn monitor() -> (DriftMonitor, DirectoryId) {
        let monitor = DriftMonitor::in_memory(DriftConfig::default());
        let id = monitor
            .register(MonitoredDirectory::new("conf", "web-01", "/srv/app").unwrap())
            .unwrap();
        (monitor, id)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (monitor, _) = monitor();
        let err = monitor
            .register(MonitoredDirectory::new("conf", "web-02", "/srv/other").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDirectory { .. }));
    }

    #[test]
    fn scan_commits_feed() {
        let (monitor, id) = monitor();
        let walker = FeedWalker::new(vec![WalkEntry::bytes("a.conf", "A"), WalkEntry::unreadable("b.key")]);
        let report = monitor.scan(id, &walker, &CancellationToken::new()).unwrap();
        assert_eq!(report.change_set.version(), 1);
        assert_eq!(report.change_set.entries()[0].category(), DriftCategory::Added);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn cancelled_scan_leaves_chain_untouched() {
        let (monitor, id) = monitor();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let walker = FeedWalker::new(vec![WalkEntry::bytes("a", "A")]);
        assert!(matches!(monitor.scan(id, &walker, &cancel), Err(Error::Cancelled { .. })));
        assert_eq!(monitor.chain().latest_version(id).unwrap(), 0);
    }

    /// Walker that runs a second scan of the same directory to completion
    /// and then cancels, while its own scan is still in flight.
    struct OverlappingWalker<'m> {
        monitor: &'m DriftMonitor,
        directory: DirectoryId,
        cancelled_any: std::sync::atomic::AtomicBool,
    }

    impl FileWalker for OverlappingWalker<'_> {
        fn walk<'a>(
            &'a self,
            _base: &NormalizedPath,
        ) -> std::io::Result<Box<dyn Iterator<Item = WalkEntry> + Send + 'a>> {
            let inner = FeedWalker::new(vec![WalkEntry::bytes("inner", "I")]);
            self.monitor
                .scan(self.directory, &inner, &CancellationToken::new())
                .map_err(std::io::Error::other)?;
            let cancelled = self.monitor.cancel_scan(self.directory);
            self.cancelled_any.store(cancelled, Ordering::SeqCst);
            Ok(Box::new(vec![WalkEntry::bytes("outer", "O")].into_iter()))
        }
    }

    #[test]
    fn finished_scan_does_not_unregister_an_overlapping_one() {
        let (monitor, id) = monitor();
        let walker = OverlappingWalker {
            monitor: &monitor,
            directory: id,
            cancelled_any: std::sync::atomic::AtomicBool::new(false),
        };

        let err = monitor.scan(id, &walker, &CancellationToken::new()).unwrap_err();
        assert!(walker.cancelled_any.load(Ordering::SeqCst));
        assert!(matches!(err, Error::Cancelled { .. }), "got {err:?}");
        assert_eq!(monitor.chain().latest_version(id).unwrap(), 1);

        // Both registrations are gone once both scans returned
        assert!(!monitor.cancel_scan(id));
    }

    #[test]
    fn cycle_scans_every_directory() {
        let (monitor, first) = monitor();
        let second = monitor
            .register(MonitoredDirectory::new("lib", "web-01", "/srv/lib").unwrap())
            .unwrap();
        let walker = FeedWalker::new(vec![WalkEntry::bytes("x", "X")]);
        let report = monitor.run_cycle(&walker, &CancellationToken::new());
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(monitor.chain().latest_version(first).unwrap(), 1);
        assert_eq!(monitor.chain().latest_version(second).unwrap(), 1);
    }

    #[test]
    fn unregister_requires_purged_chain() {
        let (monitor, id) = monitor();
        let walker = FeedWalker::new(vec![WalkEntry::bytes("a", "A")]);
        monitor.scan(id, &walker, &CancellationToken::new()).unwrap();
        assert!(matches!(monitor.unregister(id), Err(Error::DirectoryInUse { .. })));
        monitor.purge(id, 1).unwrap();
        monitor.unregister(id).unwrap();
        assert!(monitor.directories().is_empty());
    }

    #[test]
    fn export_uses_wire_format() {
        let (monitor, id) = monitor();
        let walker = FeedWalker::new(vec![WalkEntry::bytes("a", "A")]);
        monitor.scan(id, &walker, &CancellationToken::new()).unwrap();
        let text = monitor.export_change_set(id, 1).unwrap();
        let parsed = wire::read_change_set(text.as_bytes()).unwrap();
        assert_eq!(parsed.headers.directory_name, "conf");
        assert_eq!(parsed.headers.version, 1);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let state = NormalizedPath::new(dir.path());
        let id = {
            let monitor = DriftMonitor::open(state.clone()).unwrap();
            let id = monitor
                .register(MonitoredDirectory::new("conf", "web-01", "/srv/app").unwrap())
                .unwrap();
            let walker = FeedWalker::new(vec![WalkEntry::bytes("a", "A")]);
            monitor.scan(id, &walker, &CancellationToken::new()).unwrap();
            id
        };

        let reopened = DriftMonitor::open(state).unwrap();
        assert_eq!(reopened.resolve("conf").unwrap().id, id);
        assert_eq!(reopened.chain().latest_version(id).unwrap(), 1);

        let walker = FeedWalker::new(vec![WalkEntry::bytes("a", "A")]);
        let report = reopened.scan(id, &walker, &CancellationToken::new()).unwrap();
        assert_eq!(report.change_set.version(), 2);
        assert!(report.change_set.is_empty());
    }
}
