use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots<K> = DashMap<K, Arc<Mutex<()>>>;

/// Per-key async locks serializing operations on the same document.
///
/// A key's slot only exists while someone holds or waits for its lock.
pub struct KeyedLocks<K: Eq + Hash> {
    slots: Arc<Slots<K>>,
}

/// Held lock on one key. Releasing the last interest in a key frees its slot.
pub struct KeyGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    slots: Arc<Slots<K>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        self.guard.take();
        // Slots are cloned under the shard lock, so a count of one means nobody
        // else holds or awaits this key.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl<K: Clone + Eq + Hash + Ord> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash + Ord> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn lock(&self, key: &K) -> KeyGuard<K> {
        let slot = self.slot(key);
        let guard = slot.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Locks several keys in a fixed (sorted) order; duplicates are locked once.
    pub async fn lock_all(&self, keys: &[&K]) -> Vec<KeyGuard<K>> {
        let mut sorted: Vec<&K> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Keys with a live slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
