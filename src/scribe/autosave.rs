//! Debounced, cancellable scheduled work keyed by an identity.
//!
//! [`Debouncer::schedule`] replaces whatever is pending for the key: the older
//! task is aborted while it is still sleeping. Once a task's delay has elapsed
//! it takes itself out of the pending table before running its job, so later
//! schedules or cancels never abort a job that is already underway.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(500);

struct Pending {
    token: u64,
    task: JoinHandle<()>,
}

pub struct Debouncer<K: Eq + Hash> {
    pending: Arc<DashMap<K, Pending>>,
    next_token: AtomicU64,
}

impl<K> Default for Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Runs `job` after `delay` unless `key` is rescheduled or cancelled first.
    pub fn schedule<F>(&self, key: K, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();

        let start = move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if pending
                    .remove_if(&task_key, |_, p| p.token == token)
                    .is_none()
                {
                    return;
                }
                job.await;
            })
        };

        // The entry lock is held while spawning so the task can never look for
        // its own entry before it is inserted.
        let superseded = match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                let task = start();
                Some(slot.insert(Pending { token, task }))
            }
            Entry::Vacant(slot) => {
                let task = start();
                slot.insert(Pending { token, task });
                None
            }
        };

        if let Some(old) = superseded {
            old.task.abort();
        }
    }

    /// Drops the pending job for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, old)) => {
                old.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<K: Eq + Hash> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().task.abort();
        }
    }
}
