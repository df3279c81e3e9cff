//! # Record Store
//!
//! Persists lightweight document records and notifies subscribers when a
//! record changes. A record is either self-contained (inline content) or
//! delegates its content to a storage handle; see [`Record`].
//!
//! ## Constraints
//!
//! - Record ids are unique.
//! - A non-null `storage_ref` is unique across records: no two records may
//!   claim the same storage location (`ScribeError::Conflict`).
//! - Exactly one of `inline_content` / `storage_ref` is set
//!   (`ScribeError::InvalidOperation` otherwise).
//!
//! ## Implementations
//!
//! - [`memory::MemRecordStore`]: in memory, for tests.
//! - [`json::JsonRecordStore`]: `records.json` in a data directory. The whole
//!   table is rewritten atomically on every change.
//!
//! ## Change Notifications
//!
//! [`RecordStore::watch`] returns a [`RecordWatch`]: an endless, lazily polled
//! sequence of the record's values. Each subscription starts with the current
//! value (if the record exists) and then yields every committed change,
//! skipping repeats.

use crate::error::Result;
use crate::model::{Handle, Record, RecordId};
use async_trait::async_trait;
use tokio::sync::watch;

pub mod json;
pub mod memory;
mod table;

pub use table::RecordTable;

/// Abstract interface for record persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_by_id(&self, id: RecordId) -> Result<Option<Record>>;

    async fn get_by_handle(&self, handle: &Handle) -> Result<Option<Record>>;

    /// Insert a new record. Fails if the id or storage reference is taken.
    async fn insert(&self, record: Record) -> Result<()>;

    /// Replace an existing record. Fails if it does not exist or its storage
    /// reference is claimed by another record.
    async fn update(&self, record: Record) -> Result<()>;

    /// All records, ordered by id.
    async fn list(&self) -> Result<Vec<Record>>;

    /// An id no record uses yet.
    async fn next_id(&self) -> Result<RecordId>;

    /// Subscribe to the values of record `id`.
    fn watch(&self, id: RecordId) -> RecordWatch;
}

/// Subscription to one record's values.
pub struct RecordWatch {
    rx: watch::Receiver<Option<Record>>,
    last: Option<Record>,
    started: bool,
}

impl RecordWatch {
    pub(crate) fn new(rx: watch::Receiver<Option<Record>>) -> Self {
        Self {
            rx,
            last: None,
            started: false,
        }
    }

    /// Waits for the next distinct value of the record.
    ///
    /// Returns `None` only once the store itself has been dropped.
    pub async fn next(&mut self) -> Option<Record> {
        loop {
            if self.started {
                self.rx.changed().await.ok()?;
            } else {
                self.started = true;
            }

            let current = self.rx.borrow_and_update().clone();
            if let Some(record) = current {
                if self.last.as_ref() != Some(&record) {
                    self.last = Some(record.clone());
                    return Some(record);
                }
            }
        }
    }
}
