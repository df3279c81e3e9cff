use super::{RecordStore, RecordTable, RecordWatch};
use crate::error::{Result, ScribeError};
use crate::model::{Handle, Record, RecordId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const RECORDS_FILENAME: &str = "records.json";

/// Record store backed by `records.json` in a data directory.
///
/// Every insert/update rewrites the file atomically. A change is only
/// published to watchers once it is on disk; a failed write rolls the
/// in-memory table back.
pub struct JsonRecordStore {
    dir: PathBuf,
    table: Mutex<RecordTable>,
    // Serializes snapshot + write so files land in commit order.
    persist: tokio::sync::Mutex<()>,
}

impl JsonRecordStore {
    /// Opens (or starts) the store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(RECORDS_FILENAME);

        let records: Vec<Record> = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(ScribeError::Serialization)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ScribeError::Io(e)),
        };
        let table = RecordTable::from_records(records)?;
        tracing::debug!(path = %path.display(), "opened record store");

        Ok(Self {
            dir,
            table: Mutex::new(table),
            persist: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILENAME)
    }

    async fn save(&self, content: String) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(ScribeError::Io)?;

        // Atomic write
        let tmp = self.dir.join(format!(".records-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content).await.map_err(ScribeError::Io)?;
        if let Err(e) = fs::rename(&tmp, self.path()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(ScribeError::Io(e));
        }
        Ok(())
    }

    /// Writes the table as it would be with `record` applied, and only then
    /// applies it, so readers never see a value that might be rolled back.
    async fn commit(
        &self,
        record: Record,
        check: fn(&RecordTable, &Record) -> Result<()>,
    ) -> Result<()> {
        let _guard = self.persist.lock().await;
        let id = record.id;

        let snapshot = {
            let table = self.table.lock();
            check(&*table, &record)?;
            serde_json::to_string_pretty(&table.records_with(&record))
                .map_err(ScribeError::Serialization)?
        };

        if let Err(e) = self.save(snapshot).await {
            tracing::warn!(record = %id, error = %e, "record write failed");
            return Err(e);
        }

        let mut table = self.table.lock();
        table.put(record);
        table.notify(id);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn get_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.table.lock().get(id).cloned())
    }

    async fn get_by_handle(&self, handle: &Handle) -> Result<Option<Record>> {
        Ok(self.table.lock().find_by_handle(handle).cloned())
    }

    async fn insert(&self, record: Record) -> Result<()> {
        self.commit(record, RecordTable::check_insert).await
    }

    async fn update(&self, record: Record) -> Result<()> {
        self.commit(record, RecordTable::check_update).await
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
