use crate::error::{Result, ScribeError};
use crate::model::{Handle, Record, RecordId};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::watch;

/// In-memory record table with constraint checks and per-record watchers.
///
/// Shared by every [`RecordStore`](super::RecordStore) implementation; stores
/// only differ in how (and whether) they persist the table.
#[derive(Default)]
pub struct RecordTable {
    records: BTreeMap<RecordId, Record>,
    watchers: HashMap<RecordId, watch::Sender<Option<Record>>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from persisted records, enforcing the same constraints
    /// as inserts.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let mut table = Self::new();
        for record in records {
            table.check_insert(&record)?;
            table.records.insert(record.id, record);
        }
        Ok(table)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn find_by_handle(&self, handle: &Handle) -> Option<&Record> {
        self.records
            .values()
            .find(|r| r.storage_ref.as_ref() == Some(handle))
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    pub fn next_id(&self) -> RecordId {
        self.records
            .keys()
            .next_back()
            .map(|id| RecordId(id.0 + 1))
            .unwrap_or(RecordId(1))
    }

    pub fn check_insert(&self, record: &Record) -> Result<()> {
        record.validate()?;
        if self.records.contains_key(&record.id) {
            return Err(ScribeError::Conflict(format!(
                "record {} already exists",
                record.id
            )));
        }
        self.check_unique_ref(record)
    }

    pub fn check_update(&self, record: &Record) -> Result<()> {
        record.validate()?;
        if !self.records.contains_key(&record.id) {
            return Err(ScribeError::RecordNotFound(record.id));
        }
        self.check_unique_ref(record)
    }

    fn check_unique_ref(&self, record: &Record) -> Result<()> {
        let Some(handle) = &record.storage_ref else {
            return Ok(());
        };
        match self.find_by_handle(handle) {
            Some(owner) if owner.id != record.id => Err(ScribeError::Conflict(format!(
                "{} is already claimed by record {}",
                handle, owner.id
            ))),
            _ => Ok(()),
        }
    }

    /// Stores `record` unchecked, returning the value it replaced.
    pub fn put(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id, record)
    }

    /// All records, ordered by id, as they would be after storing `record`.
    pub fn records_with(&self, record: &Record) -> Vec<Record> {
        let mut records = self.records();
        match records.binary_search_by_key(&record.id, |r| r.id) {
            Ok(i) => records[i] = record.clone(),
            Err(i) => records.insert(i, record.clone()),
        }
        records
    }

    /// Publishes the committed value of `id` to its watchers.
    pub fn notify(&mut self, id: RecordId) {
        let value = self.records.get(&id).cloned();
        let stale = match self.watchers.get(&id) {
            Some(sender) if sender.receiver_count() == 0 => true,
            Some(sender) => {
                sender.send_replace(value);
                false
            }
            None => false,
        };
        if stale {
            self.watchers.remove(&id);
        }
    }

    pub fn subscribe(&mut self, id: RecordId) -> watch::Receiver<Option<Record>> {
        if let Some(sender) = self.watchers.get(&id) {
            return sender.subscribe();
        }
        let (sender, receiver) = watch::channel(self.records.get(&id).cloned());
        self.watchers.insert(id, sender);
        receiver
    }

    /// Checks, stores and publishes an insert in one step.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        self.check_insert(&record)?;
        let id = record.id;
        self.put(record);
        self.notify(id);
        Ok(())
    }

    /// Checks, stores and publishes an update in one step.
    pub fn update(&mut self, record: Record) -> Result<()> {
        self.check_update(&record)?;
        let id = record.id;
        self.put(record);
        self.notify(id);
        Ok(())
    }
}
