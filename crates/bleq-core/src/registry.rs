// ── Scan request registry ──
//
// Maps a filter key to the single shared scan serving it, with an observer
// count. All mutations happen under one lock; teardown of the shared value
// runs after the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::model::FilterKey;

/// Identity of one registry entry. A key can be served by several shared
/// scans over time; the id tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanId(u64);

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared-{}", self.0)
    }
}

/// Value stored in the registry.
pub trait SharedResource: Send + Sync + 'static {
    /// Per-observer handle, created under the registry lock so that no
    /// observer can miss a terminal event published after it joined.
    type Observer;

    fn observe(&self) -> Self::Observer;

    /// Called once, outside the lock, when the last observer leaves.
    fn teardown(&self);
}

struct Entry<S> {
    id: ScanId,
    shared: Arc<S>,
    observers: usize,
}

/// Deduplication table for shared scans.
pub struct ScanRequestRegistry<S> {
    entries: Mutex<HashMap<FilterKey, Entry<S>>>,
    next_id: AtomicU64,
}

impl<S: SharedResource> Default for ScanRequestRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SharedResource> ScanRequestRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Join the shared value for `key`, creating it with `factory` if no
    /// entry exists. The factory runs under the lock and must not call back
    /// into the registry.
    pub fn get_or_create(
        &self,
        key: &FilterKey,
        factory: impl FnOnce(ScanId) -> S,
    ) -> (ScanId, Arc<S>, S::Observer) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            let id = ScanId(self.next_id.fetch_add(1, Ordering::Relaxed));
            debug!(%key, %id, "creating shared scan");
            Entry {
                id,
                shared: Arc::new(factory(id)),
                observers: 0,
            }
        });
        entry.observers += 1;
        trace!(%key, id = %entry.id, observers = entry.observers, "observer joined");
        (entry.id, Arc::clone(&entry.shared), entry.shared.observe())
    }

    /// Leave the entry `id` for `key`. When the last observer leaves the
    /// entry is removed and torn down. Releases for an entry that was
    /// already replaced or evicted are ignored.
    pub fn release(&self, key: &FilterKey, id: ScanId) {
        let removed = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if entry.id != id {
                return;
            }
            entry.observers = entry.observers.saturating_sub(1);
            trace!(%key, %id, observers = entry.observers, "observer left");
            if entry.observers > 0 {
                return;
            }
            entries.remove(key)
        };

        if let Some(entry) = removed {
            debug!(%key, %id, "last observer left, tearing down shared scan");
            entry.shared.teardown();
        }
    }

    /// Drop the entry `id` for `key` without tearing it down. Used when the
    /// shared value already reached a terminal state on its own.
    pub fn evict(&self, key: &FilterKey, id: ScanId) -> bool {
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
            debug!(%key, %id, "evicted finished shared scan");
            return true;
        }
        false
    }

    pub fn contains(&self, key: &FilterKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn observer_count(&self, key: &FilterKey) -> usize {
        self.lock().get(key).map_or(0, |entry| entry.observers)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FilterKey, Entry<S>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> fmt::Debug for ScanRequestRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ScanRequestRegistry")
            .field("entries", &len)
            .finish()
    }
}
