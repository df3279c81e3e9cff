//! # Buffer Registry
//!
//! Owns the in-memory buffers of a session and the bijection between keys
//! (storage handles, or record ids for record-backed documents) and buffers.
//!
//! ## Tables
//!
//! ```text
//! forward       key       -> Buffer
//! inverse       BufferId  -> key
//! fingerprints  key       -> Fingerprint   (content as of last persist)
//! ```
//!
//! All three live behind a single mutex and are only touched together, inside
//! short critical sections that never cross an await point. Invariants held
//! after every public call:
//!
//! - `forward` and `inverse` are mutual inverses (no key maps to two buffers,
//!   no buffer is bound to two keys).
//! - every fingerprinted key is bound.
//!
//! ## Single-flight creation
//!
//! [`BufferRegistry::get_or_create`] runs its content provider at most once per
//! key, even when many tasks ask for the same key at the same time. Waiters
//! share one `OnceCell`; a failing provider leaves nothing behind and the next
//! caller tries again.

use crate::buffer::{Buffer, BufferId};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Bounds for registry keys.
pub trait RegistryKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K: Clone + Eq + Hash + Debug + Send + Sync + 'static> RegistryKey for K {}

struct Tables<K> {
    forward: HashMap<K, Buffer>,
    inverse: HashMap<BufferId, K>,
    fingerprints: HashMap<K, Fingerprint>,
}

impl<K: RegistryKey> Tables<K> {
    fn new() -> Self {
        Self {
            forward: HashMap::new(),
            inverse: HashMap::new(),
            fingerprints: HashMap::new(),
        }
    }

    fn bind(&mut self, key: K, buffer: Buffer) -> Option<Buffer> {
        if let Some(previous_key) = self.inverse.get(&buffer.id()).cloned() {
            if previous_key == key {
                return None;
            }
            self.forward.remove(&previous_key);
            self.fingerprints.remove(&previous_key);
        }

        let evicted = self.forward.insert(key.clone(), buffer.clone());
        if let Some(evicted) = &evicted {
            self.inverse.remove(&evicted.id());
        }
        self.inverse.insert(buffer.id(), key);
        evicted
    }

    fn unbind(&mut self, key: &K) -> Option<Buffer> {
        let buffer = self.forward.remove(key)?;
        self.inverse.remove(&buffer.id());
        self.fingerprints.remove(key);
        Some(buffer)
    }
}

pub struct BufferRegistry<K> {
    tables: Mutex<Tables<K>>,
    in_flight: Mutex<HashMap<K, Arc<OnceCell<Buffer>>>>,
}

impl<K: RegistryKey> Default for BufferRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RegistryKey> BufferRegistry<K> {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<Buffer> {
        self.tables.lock().forward.get(key).cloned()
    }

    /// Returns the buffer bound to `key`, creating it from `provider` if none is.
    ///
    /// The provider may suspend (it usually reads storage). It runs at most once
    /// per key across concurrent callers; its content becomes both the buffer's
    /// initial text and the key's fingerprint.
    pub async fn get_or_create<F, Fut>(&self, key: &K, provider: F) -> Result<Buffer>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(existing) = self.get(key) {
            tracing::debug!(?key, "buffer cache hit");
            return Ok(existing);
        }

        let cell = self
            .in_flight
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| async move {
                // A previous flight may have finished between the lookup above
                // and joining this cell.
                if let Some(existing) = self.get(key) {
                    return Ok(existing);
                }

                let content = provider().await?;
                let mut tables = self.tables.lock();
                if let Some(existing) = tables.forward.get(key) {
                    return Ok(existing.clone());
                }

                let buffer = Buffer::new(content.as_str());
                tables.bind(key.clone(), buffer.clone());
                tables
                    .fingerprints
                    .insert(key.clone(), Fingerprint::of(&content));
                tracing::debug!(?key, buffer = %buffer.id(), "buffer created");
                Ok(buffer)
            })
            .await
            .cloned();

        // Clones are only taken under this lock, so a count of two (map + ours)
        // means no other caller is still waiting on a failed cell.
        let mut in_flight = self.in_flight.lock();
        if let Some(current) = in_flight.get(key) {
            if Arc::ptr_eq(current, &cell) && (cell.initialized() || Arc::strong_count(&cell) == 2) {
                in_flight.remove(key);
            }
        }

        result
    }

    /// Binds `buffer` to `key`, keeping the binding a bijection.
    ///
    /// If `buffer` was bound to another key, that binding and its fingerprint
    /// are dropped first. A different buffer already bound to `key` is evicted
    /// and returned; its content is not reconciled.
    pub fn bind(&self, key: K, buffer: Buffer) -> Option<Buffer> {
        self.tables.lock().bind(key, buffer)
    }

    /// Same as [`bind`](Self::bind), recording `content` as the key's
    /// fingerprint in the same critical section.
    pub fn bind_with_fingerprint(&self, key: K, buffer: Buffer, content: &str) -> Option<Buffer> {
        let mut tables = self.tables.lock();
        let evicted = tables.bind(key.clone(), buffer);
        tables.fingerprints.insert(key, Fingerprint::of(content));
        evicted
    }

    /// Binds `buffer` to `key` with `content` as the fingerprint, unless
    /// `buffer` is already bound to a different key. In that case a copy of
    /// it (seeded with `content` and its selection) is bound instead, so two
    /// keys never alias one buffer and the original binding stays as it was.
    ///
    /// Returns the buffer now bound to `key` and the evicted previous occupant.
    pub fn bind_or_fork(&self, key: K, buffer: &Buffer, content: &str) -> (Buffer, Option<Buffer>) {
        let mut tables = self.tables.lock();
        let bound = match tables.inverse.get(&buffer.id()) {
            Some(current) if *current != key => {
                Buffer::with_selection(content, buffer.selection())
            }
            _ => buffer.clone(),
        };
        let evicted = tables.bind(key.clone(), bound.clone());
        tables.fingerprints.insert(key, Fingerprint::of(content));
        (bound, evicted)
    }

    pub fn unbind(&self, key: &K) -> Option<Buffer> {
        self.tables.lock().unbind(key)
    }

    pub fn reverse_lookup(&self, buffer: &Buffer) -> Option<K> {
        self.tables.lock().inverse.get(&buffer.id()).cloned()
    }

    /// True when `content` hashes to the fingerprint recorded for `key`,
    /// meaning a write would be a no-op.
    pub fn fingerprint_matches(&self, key: &K, content: &str) -> bool {
        self.tables
            .lock()
            .fingerprints
            .get(key)
            .is_some_and(|fp| fp.matches(content))
    }

    /// Records `content` as persisted for `key`. Ignored (returns false) when
    /// nothing is bound to `key` any more.
    pub fn record_fingerprint(&self, key: &K, content: &str) -> bool {
        let mut tables = self.tables.lock();
        if !tables.forward.contains_key(key) {
            tracing::debug!(?key, "skipping fingerprint for unbound key");
            return false;
        }
        tables
            .fingerprints
            .insert(key.clone(), Fingerprint::of(content));
        true
    }

    pub fn fingerprint(&self, key: &K) -> Option<Fingerprint> {
        self.tables.lock().fingerprints.get(key).copied()
    }

    pub fn keys(&self) -> Vec<K> {
        self.tables.lock().forward.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().forward.is_empty()
    }

    /// Creations currently underway.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Checks the bijection and fingerprint invariants.
    pub fn is_consistent(&self) -> bool {
        let tables = self.tables.lock();
        tables.forward.len() == tables.inverse.len()
            && tables
                .forward
                .iter()
                .all(|(key, buffer)| tables.inverse.get(&buffer.id()) == Some(key))
            && tables
                .fingerprints
                .keys()
                .all(|key| tables.forward.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScribeError;
    use crate::model::Handle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn h(name: &str) -> Handle {
        Handle::new(name)
    }

    #[test]
    fn bind_and_reverse_lookup() {
        let registry = BufferRegistry::new();
        let buffer = Buffer::new("a");
        assert!(registry.bind(h("a.txt"), buffer.clone()).is_none());
        assert_eq!(registry.get(&h("a.txt")), Some(buffer.clone()));
        assert_eq!(registry.reverse_lookup(&buffer), Some(h("a.txt")));
        assert!(registry.is_consistent());
    }

    #[test]
    fn rebinding_buffer_moves_it() {
        let registry = BufferRegistry::new();
        let buffer = Buffer::new("a");
        registry.bind_with_fingerprint(h("a.txt"), buffer.clone(), "a");
        registry.bind(h("b.txt"), buffer.clone());

        assert!(registry.get(&h("a.txt")).is_none());
        assert!(registry.fingerprint(&h("a.txt")).is_none());
        assert_eq!(registry.reverse_lookup(&buffer), Some(h("b.txt")));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn binding_occupied_key_evicts() {
        let registry = BufferRegistry::new();
        let first = Buffer::new("1");
        let second = Buffer::new("2");
        registry.bind(h("x"), first.clone());
        let evicted = registry.bind(h("x"), second.clone());

        assert_eq!(evicted, Some(first.clone()));
        assert!(registry.reverse_lookup(&first).is_none());
        assert_eq!(registry.reverse_lookup(&second), Some(h("x")));
        assert!(registry.is_consistent());
    }

    #[test]
    fn rebinding_same_pair_is_noop() {
        let registry = BufferRegistry::new();
        let buffer = Buffer::new("a");
        registry.bind_with_fingerprint(h("a"), buffer.clone(), "a");
        assert!(registry.bind(h("a"), buffer).is_none());
        assert!(registry.fingerprint_matches(&h("a"), "a"));
    }

    #[test]
    fn bijection_holds_over_mixed_sequence() {
        let registry = BufferRegistry::new();
        let buffers: Vec<Buffer> = (0..4).map(|i| Buffer::new(i.to_string())).collect();
        let keys = ["a", "b", "c"];

        for step in 0..40usize {
            let buffer = buffers[step % buffers.len()].clone();
            let key = h(keys[(step * 7 + 3) % keys.len()]);
            if step % 5 == 4 {
                registry.unbind(&key);
            } else {
                registry.bind(key, buffer);
            }
            assert!(registry.is_consistent(), "broken after step {}", step);
        }
    }

    #[test]
    fn bind_or_fork_binds_unbound_buffer_itself() {
        let registry = BufferRegistry::new();
        let buffer = Buffer::new("draft");
        let (bound, evicted) = registry.bind_or_fork(h("x"), &buffer, "draft");
        assert_eq!(bound, buffer);
        assert!(evicted.is_none());
        assert!(registry.fingerprint_matches(&h("x"), "draft"));
    }

    #[test]
    fn bind_or_fork_copies_buffer_bound_elsewhere() {
        let registry = BufferRegistry::new();
        let buffer = Buffer::with_selection("hello", crate::model::Selection::caret(2));
        registry.bind_with_fingerprint(h("a"), buffer.clone(), "hello");

        let (bound, _) = registry.bind_or_fork(h("b"), &buffer, "hello");
        assert_ne!(bound, buffer);
        assert_eq!(bound.text(), "hello");
        assert_eq!(bound.selection(), buffer.selection());
        assert_eq!(registry.reverse_lookup(&buffer), Some(h("a")));
        assert_eq!(registry.reverse_lookup(&bound), Some(h("b")));
        assert!(registry.is_consistent());
    }

    #[test]
    fn fingerprints_only_for_bound_keys() {
        let registry: BufferRegistry<Handle> = BufferRegistry::new();
        assert!(!registry.record_fingerprint(&h("ghost"), "boo"));
        assert!(!registry.fingerprint_matches(&h("ghost"), "boo"));

        registry.bind(h("real"), Buffer::new("x"));
        assert!(registry.record_fingerprint(&h("real"), "x"));
        assert!(registry.fingerprint_matches(&h("real"), "x"));
        assert!(!registry.fingerprint_matches(&h("real"), "y"));
    }

    #[tokio::test]
    async fn get_or_create_seeds_and_fingerprints() {
        let registry = BufferRegistry::new();
        let buffer = registry
            .get_or_create(&h("doc"), || async { Ok("seed".to_string()) })
            .await
            .unwrap();
        assert_eq!(buffer.text(), "seed");
        assert!(registry.fingerprint_matches(&h("doc"), "seed"));

        let again = registry
            .get_or_create(&h("doc"), || async { Ok("other".to_string()) })
            .await
            .unwrap();
        assert_eq!(again, buffer);
        assert_eq!(again.text(), "seed");
    }

    #[tokio::test]
    async fn get_or_create_failure_leaves_no_trace() {
        let registry: BufferRegistry<Handle> = BufferRegistry::new();
        let result = registry
            .get_or_create(&h("doc"), || async {
                Err(ScribeError::NotFound(Handle::new("doc")))
            })
            .await;
        assert!(matches!(result, Err(ScribeError::NotFound(_))));
        assert!(registry.is_empty());
        assert_eq!(registry.in_flight_count(), 0);

        let buffer = registry
            .get_or_create(&h("doc"), || async { Ok("retry".to_string()) })
            .await
            .unwrap();
        assert_eq!(buffer.text(), "retry");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn get_or_create_is_single_flight() {
        let registry = Arc::new(BufferRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .get_or_create(&h("shared"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok("content".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut buffers = Vec::new();
        for task in tasks {
            buffers.push(task.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(buffers.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.in_flight_count(), 0);
    }
}
