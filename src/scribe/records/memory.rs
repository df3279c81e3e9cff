use super::{RecordStore, RecordTable, RecordWatch};
use crate::error::{Result, ScribeError};
use crate::model::{Handle, Record, RecordId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory record store for testing.
#[derive(Default)]
pub struct MemRecordStore {
    table: Mutex<RecordTable>,
    simulate_write_error: AtomicBool,
}

impl MemRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Result<Self> {
        Ok(Self {
            table: Mutex::new(RecordTable::from_records(records)?),
            simulate_write_error: AtomicBool::new(false),
        })
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(ScribeError::Storage("Simulated write error".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemRecordStore {
    async fn get_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.table.lock().get(id).cloned())
    }

    async fn get_by_handle(&self, handle: &Handle) -> Result<Option<Record>> {
        Ok(self.table.lock().find_by_handle(handle).cloned())
    }

    async fn insert(&self, record: Record) -> Result<()> {
        self.check_writable()?;
        self.table.lock().insert(record)
    }

    async fn update(&self, record: Record) -> Result<()> {
        self.check_writable()?;
        self.table.lock().update(record)
    }

    async fn list(&self) -> Result<Vec<Record>> {
        Ok(self.table.lock().records())
    }

    async fn next_id(&self) -> Result<RecordId> {
        Ok(self.table.lock().next_id())
    }

    fn watch(&self, id: RecordId) -> RecordWatch {
        RecordWatch::new(self.table.lock().subscribe(id))
    }
}
