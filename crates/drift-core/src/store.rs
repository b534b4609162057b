//! Content-addressed store of file records
//!
//! Records are keyed by fingerprint, so a body is held once no matter how
//! many paths, snapshots or resources reference it. Lifetime is managed with
//! explicit reference counts: the chain retains every record a committed
//! entry points at and releases them when the change set is purged. Records
//! at zero references linger until [`FileRecordStore::collect`] sweeps them.
//!
//! A scan interns through a [`PinSet`]. Pinned records are skipped by
//! `collect` even at zero references, which keeps a sweep that runs between
//! a scan and its commit from dropping what the commit is about to retain.

use crate::config::StoreConfig;
use crate::model::FileRecord;
use crate::{Error, Result};
use drift_fs::Fingerprint;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

struct Slot {
    record: FileRecord,
    refs: u64,
    pins: u64,
}

impl Slot {
    fn new(record: FileRecord) -> Self {
        Self { record, refs: 0, pins: 0 }
    }
}

/// Outcome of a garbage-collection sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub removed: usize,
    pub bytes_freed: u64,
}

/// Shared, thread-safe record arena.
pub struct FileRecordStore {
    slots: RwLock<HashMap<Fingerprint, Slot>>,
    config: StoreConfig,
}

impl FileRecordStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Fingerprint `content` and return its record, creating it on first
    /// sight.
    ///
    /// The check-then-create runs under the write lock, so concurrent
    /// callers interning identical bytes converge on one record.
    pub fn intern(&self, content: impl Into<Arc<[u8]>>) -> FileRecord {
        self.intern_bytes(content.into(), false)
    }

    /// Register a body known only by digest, as reported by walkers that
    /// hash on the agent side.
    pub fn intern_fingerprint(&self, fingerprint: Fingerprint, len: u64) -> FileRecord {
        self.intern_digest(fingerprint, len, false)
    }

    /// Start a pin set for one scan.
    pub fn pin_set(self: &Arc<Self>) -> PinSet {
        PinSet {
            store: Arc::clone(self),
            pinned: Vec::new(),
        }
    }

    fn intern_bytes(&self, content: Arc<[u8]>, pin: bool) -> FileRecord {
        let fingerprint = Fingerprint::of(&content);
        let len = content.len() as u64;

        let mut slots = self.slots.write();
        let slot = match slots.entry(fingerprint) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(vacant) => {
                let record = if self.should_retain(len) {
                    FileRecord::from_content(content)
                } else {
                    FileRecord::new(fingerprint, len)
                };
                debug!(%fingerprint, len, "Interned new file record");
                vacant.insert(Slot::new(record))
            }
        };
        if pin {
            slot.pins += 1;
        }
        slot.record.clone()
    }

    fn intern_digest(&self, fingerprint: Fingerprint, len: u64, pin: bool) -> FileRecord {
        let mut slots = self.slots.write();
        let slot = slots
            .entry(fingerprint)
            .or_insert_with(|| Slot::new(FileRecord::new(fingerprint, len)));
        if pin {
            slot.pins += 1;
        }
        slot.record.clone()
    }

    fn unpin(&self, fingerprints: &[Fingerprint]) {
        let mut slots = self.slots.write();
        for fingerprint in fingerprints {
            if let Some(slot) = slots.get_mut(fingerprint) {
                slot.pins = slot.pins.saturating_sub(1);
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::FingerprintNotFound`] for unknown fingerprints.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<FileRecord> {
        self.slots
            .read()
            .get(fingerprint)
            .map(|slot| slot.record.clone())
            .ok_or(Error::FingerprintNotFound {
                fingerprint: *fingerprint,
            })
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.slots.read().contains_key(fingerprint)
    }

    /// Add one reference, re-registering the record if a sweep removed it.
    ///
    /// A stored record without content picks up the content `record`
    /// carries. Returns the new reference count.
    pub fn retain(&self, record: &FileRecord) -> u64 {
        let mut slots = self.slots.write();
        let slot = slots
            .entry(record.fingerprint())
            .or_insert_with(|| Slot::new(record.clone()));
        if slot.record.content().is_none() && record.content().is_some() {
            slot.record = record.clone();
        }
        slot.refs += 1;
        slot.refs
    }

    /// Drop one reference. At zero the record becomes eligible for
    /// collection but stays readable until the next sweep.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FingerprintNotFound`] for unknown fingerprints.
    pub fn release(&self, fingerprint: &Fingerprint) -> Result<u64> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(fingerprint).ok_or(Error::FingerprintNotFound {
            fingerprint: *fingerprint,
        })?;
        if slot.refs == 0 {
            warn!(%fingerprint, "Released a file record that holds no references");
        }
        slot.refs = slot.refs.saturating_sub(1);
        Ok(slot.refs)
    }

    /// Current reference count, `None` if the record is unknown.
    pub fn ref_count(&self, fingerprint: &Fingerprint) -> Option<u64> {
        self.slots.read().get(fingerprint).map(|slot| slot.refs)
    }

    /// Delete every record without references or pins.
    pub fn collect(&self) -> CollectStats {
        let mut stats = CollectStats::default();
        self.slots.write().retain(|_, slot| {
            if slot.refs > 0 || slot.pins > 0 {
                return true;
            }
            stats.removed += 1;
            stats.bytes_freed += slot.record.content().map_or(0, |c| c.len() as u64);
            false
        });
        if stats.removed > 0 {
            debug!(removed = stats.removed, bytes = stats.bytes_freed, "Collected file records");
        }
        stats
    }

    /// Number of distinct bodies known to the store.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Bytes of retained content currently held in memory.
    pub fn retained_bytes(&self) -> u64 {
        self.slots
            .read()
            .values()
            .map(|slot| slot.record.content().map_or(0, |c| c.len() as u64))
            .sum()
    }

    fn should_retain(&self, len: u64) -> bool {
        self.config.retain_content && len <= self.config.max_retained_bytes
    }
}

/// Records interned by one scan, held back from collection until dropped.
pub struct PinSet {
    store: Arc<FileRecordStore>,
    pinned: Vec<Fingerprint>,
}

impl PinSet {
    pub fn intern(&mut self, content: impl Into<Arc<[u8]>>) -> FileRecord {
        let record = self.store.intern_bytes(content.into(), true);
        self.pinned.push(record.fingerprint());
        record
    }

    pub fn intern_fingerprint(&mut self, fingerprint: Fingerprint, len: u64) -> FileRecord {
        let record = self.store.intern_digest(fingerprint, len, true);
        self.pinned.push(fingerprint);
        record
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

impl Drop for PinSet {
    fn drop(&mut self) {
        self.store.unpin(&self.pinned);
    }
}

impl std::fmt::Debug for PinSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinSet").field("pinned", &self.pinned.len()).finish()
    }
}

impl Default for FileRecordStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("records", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
