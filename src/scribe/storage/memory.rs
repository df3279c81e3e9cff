use super::StorageGateway;
use crate::error::{Result, ScribeError};
use crate::model::Handle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory storage gateway for testing.
///
/// Uses a `parking_lot::Mutex` since gateways are shared across tasks. Never
/// holds the lock across the simulated latency.
#[derive(Default)]
pub struct MemGateway {
    files: Mutex<HashMap<Handle, String>>,
    denied: Mutex<HashSet<Handle>>,
    latency: Mutex<Option<Duration>>,
    simulate_write_error: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, handle: impl Into<Handle>, content: &str) -> Self {
        self.put(handle, content);
        self
    }

    /// Seeds content without counting as a write.
    pub fn put(&self, handle: impl Into<Handle>, content: &str) {
        self.files.lock().insert(handle.into(), content.to_string());
    }

    /// Current content, bypassing counters and failure injection.
    pub fn contents(&self, handle: &Handle) -> Option<String> {
        self.files.lock().get(handle).cloned()
    }

    pub fn remove(&self, handle: &Handle) -> Option<String> {
        self.files.lock().remove(handle)
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Makes every access to `handle` fail with `PermissionDenied`.
    pub fn deny(&self, handle: impl Into<Handle>) {
        self.denied.lock().insert(handle.into());
    }

    /// Every read and write sleeps for `latency` before touching the map.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_access(&self, handle: &Handle) -> Result<()> {
        if self.denied.lock().contains(handle) {
            return Err(ScribeError::PermissionDenied(handle.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for MemGateway {
    async fn read(&self, handle: &Handle) -> Result<String> {
        self.delay().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_access(handle)?;
        self.files
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| ScribeError::NotFound(handle.clone()))
    }

    async fn write(&self, handle: &Handle, content: &str) -> Result<()> {
        self.delay().await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_access(handle)?;
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(ScribeError::Storage("Simulated write error".to_string()));
        }
        self.files.lock().insert(handle.clone(), content.to_string());
        Ok(())
    }

    async fn display_name(&self, handle: &Handle) -> Result<String> {
        self.check_access(handle)?;
        Ok(handle
            .as_str()
            .rsplit('/')
            .next()
            .unwrap_or(handle.as_str())
            .to_string())
    }
}
