// ── Reactive per-device collection ──
//
// Concurrent storage keyed by device address with push-based change
// notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::Address;
use crate::stream::Snapshot;

/// A concurrent, reactive collection keyed by [`Address`].
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Snapshots are ordered by address so consumers
/// iterate deterministically.
pub(crate) struct Collection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<Address, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> Collection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace an entry. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: Address, value: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(value)).is_none();
        self.publish();
        is_new
    }

    /// Replace the whole collection in one step.
    pub(crate) fn replace_all(&self, entries: impl IntoIterator<Item = (Address, T)>) {
        self.by_key.clear();
        for (key, value) in entries {
            self.by_key.insert(key, Arc::new(value));
        }
        self.publish();
    }

    /// Remove an entry. Returns the removed value if it existed.
    pub(crate) fn remove(&self, key: &Address) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Mutate one entry in place (copy-on-write against outstanding
    /// snapshots). Returns `None` if the key is absent. Subscribers are
    /// notified only when `f` returns `Ok`.
    pub(crate) fn modify<R, E>(
        &self,
        key: &Address,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let result = {
            let mut entry = self.by_key.get_mut(key)?;
            f(Arc::make_mut(entry.value_mut()))
        };
        if result.is_ok() {
            self.publish();
        }
        Some(result)
    }

    pub(crate) fn get(&self, key: &Address) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &Address) -> bool {
        self.by_key.contains_key(key)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// All keys in ascending order.
    pub(crate) fn keys(&self) -> Vec<Address> {
        let mut keys: Vec<Address> = self.by_key.iter().map(|r| *r.key()).collect();
        keys.sort_unstable();
        keys
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut entries: Vec<(Address, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();

        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
