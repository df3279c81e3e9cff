//! # Sheets
//!
//! Record-backed documents. A sheet is keyed by its [`RecordId`] for its whole
//! life, whether its content lives inline in the record (transient) or in a
//! storage location (persisted). Buffers are held in an id-keyed
//! [`BufferRegistry`], so moving a sheet from inline to stored content never
//! changes which buffer the editor is looking at.
//!
//! ## Operations
//!
//! - [`SheetService::get_or_create`]: inserts a transient record when the id
//!   is unknown, then materializes one buffer per id.
//! - [`SheetService::subscribe`]: a stream of [`EditorState`]s re-derived on
//!   every distinct record change.
//! - [`SheetService::save`], [`SheetService::save_as`] and
//!   [`SheetService::replace_with_file`].
//!
//! Operations on one id are serialized; different ids run concurrently.

use crate::buffer::Buffer;
use crate::error::{Result, ScribeError};
use crate::locks::KeyedLocks;
use crate::model::{Handle, Record, RecordId, Sheet};
use crate::records::{RecordStore, RecordWatch};
use crate::registry::BufferRegistry;
use crate::session::SaveOutcome;
use crate::storage::StorageGateway;
use std::sync::Arc;

/// A sheet together with the buffer that edits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    pub sheet: Sheet,
    pub buffer: Buffer,
}

struct Inner<G, R> {
    gateway: Arc<G>,
    records: Arc<R>,
    registry: BufferRegistry<RecordId>,
    locks: KeyedLocks<RecordId>,
}

pub struct SheetService<G, R> {
    inner: Arc<Inner<G, R>>,
}

impl<G, R> Clone for SheetService<G, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, R> SheetService<G, R>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    pub fn new(gateway: Arc<G>, records: Arc<R>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                records,
                registry: BufferRegistry::new(),
                locks: KeyedLocks::new(),
            }),
        }
    }

    pub fn registry(&self) -> &BufferRegistry<RecordId> {
        &self.inner.registry
    }

    pub fn records(&self) -> &Arc<R> {
        &self.inner.records
    }

    /// Returns the record for `id`, inserting a transient one seeded with
    /// `default` if there is none. Caller holds the id's lock.
    async fn load_or_insert(&self, id: RecordId, default: &str) -> Result<Record> {
        if let Some(record) = self.inner.records.get_by_id(id).await? {
            return Ok(record);
        }
        let record = Record::inline(id, default);
        self.inner.records.insert(record.clone()).await?;
        tracing::debug!(record = %id, "created transient record");
        Ok(record)
    }

    /// The buffer bound to the sheet's id, seeding it on first use.
    async fn materialize(&self, sheet: &Sheet, default: &str) -> Result<Buffer> {
        let gateway = Arc::clone(&self.inner.gateway);
        let source = sheet.clone();
        let fallback = default.to_string();

        self.inner
            .registry
            .get_or_create(&sheet.id(), move || async move {
                match source {
                    Sheet::Transient { contents, .. } => Ok(contents),
                    Sheet::Persisted { id, handle } => match gateway.read(&handle).await {
                        Ok(content) => Ok(content),
                        Err(e) => {
                            tracing::warn!(record = %id, %handle, error = %e, "could not read sheet file, using default content");
                            Ok(fallback)
                        }
                    },
                }
            })
            .await
    }

    /// The sheet for `id` and its buffer, creating both if needed.
    pub async fn get_or_create(&self, id: RecordId, default: &str) -> Result<EditorState> {
        let record = {
            let _guard = self.inner.locks.lock(&id).await;
            self.load_or_insert(id, default).await?
        };
        let sheet = Sheet::from_record(&record);
        let buffer = self.materialize(&sheet, default).await?;
        Ok(EditorState { sheet, buffer })
    }

    /// Follows record `id`, yielding a fresh [`EditorState`] for every
    /// distinct value. The record is created on first poll if missing.
    pub fn subscribe(&self, id: RecordId, default: impl Into<String>) -> EditorStates<G, R> {
        EditorStates {
            service: self.clone(),
            id,
            default: default.into(),
            watch: self.inner.records.watch(id),
            started: false,
        }
    }

    /// Persists the sheet's buffer: inline content for transient sheets, the
    /// storage location for persisted ones.
    pub async fn save(&self, id: RecordId) -> Result<SaveOutcome> {
        let _guard = self.inner.locks.lock(&id).await;
        self.save_locked(id).await
    }

    /// Body of [`save`](Self::save). Caller holds the id's lock.
    async fn save_locked(&self, id: RecordId) -> Result<SaveOutcome> {
        let buffer = self.inner.registry.get(&id).ok_or_else(|| {
            ScribeError::InvalidOperation(format!("sheet {} is not open", id))
        })?;
        let record = self
            .inner
            .records
            .get_by_id(id)
            .await?
            .ok_or(ScribeError::RecordNotFound(id))?;

        let content = buffer.text();
        if self.inner.registry.fingerprint_matches(&id, &content) {
            return Ok(SaveOutcome::NoOp);
        }

        match Sheet::from_record(&record) {
            Sheet::Transient { .. } => {
                self.inner
                    .records
                    .update(Record::inline(id, content.clone()))
                    .await?
            }
            Sheet::Persisted { handle, .. } => {
                self.inner.gateway.write(&handle, &content).await?
            }
        }

        self.inner.registry.record_fingerprint(&id, &content);
        tracing::info!(record = %id, "sheet saved");
        Ok(SaveOutcome::Written)
    }

    /// Writes the sheet to `handle` and makes it a persisted sheet there.
    ///
    /// A sheet that already had a file keeps its old file untouched and
    /// continues in a copy of its buffer; a transient sheet keeps its buffer.
    /// Saving a sheet to the file it already uses is a plain [`save`](Self::save).
    pub async fn save_as(&self, id: RecordId, handle: &Handle) -> Result<EditorState> {
        let _guard = self.inner.locks.lock(&id).await;

        let record = self
            .inner
            .records
            .get_by_id(id)
            .await?
            .ok_or(ScribeError::RecordNotFound(id))?;
        let sheet = Sheet::from_record(&record);
        if let Some(owner) = self.inner.records.get_by_handle(handle).await? {
            if owner.id != id {
                return Err(ScribeError::Conflict(format!(
                    "{} is already open as sheet {}",
                    handle, owner.id
                )));
            }
        }

        let current = self.materialize(&sheet, "").await?;
        if sheet.handle() == Some(handle) {
            self.save_locked(id).await?;
            return Ok(EditorState {
                sheet,
                buffer: current,
            });
        }

        let buffer = if sheet.is_persisted() {
            current.duplicate()
        } else {
            current
        };
        let content = buffer.text();

        self.inner.gateway.write(handle, &content).await?;
        let persisted = Sheet::Persisted {
            id,
            handle: handle.clone(),
        };
        self.inner.records.update(persisted.to_record()).await?;
        self.inner
            .registry
            .bind_with_fingerprint(id, buffer.clone(), &content);

        tracing::info!(record = %id, %handle, "sheet saved as");
        Ok(EditorState {
            sheet: persisted,
            buffer,
        })
    }

    /// Points the sheet at `handle` and loads that file's content into its
    /// buffer, creating the record if needed.
    pub async fn replace_with_file(&self, id: RecordId, handle: &Handle) -> Result<EditorState> {
        let _guard = self.inner.locks.lock(&id).await;

        let content = self.inner.gateway.read(handle).await?;
        self.load_or_insert(id, "").await?;

        let persisted = Sheet::Persisted {
            id,
            handle: handle.clone(),
        };
        self.inner.records.update(persisted.to_record()).await?;

        let seed = content.clone();
        let buffer = self
            .inner
            .registry
            .get_or_create(&id, move || async move { Ok(seed) })
            .await?;
        if buffer.text() != content {
            buffer.replace_all(content.as_str());
        }
        self.inner.registry.record_fingerprint(&id, &content);

        tracing::info!(record = %id, %handle, "sheet attached to file");
        Ok(EditorState {
            sheet: persisted,
            buffer,
        })
    }
}

/// Stream of editor states for one record. See [`SheetService::subscribe`].
pub struct EditorStates<G, R> {
    service: SheetService<G, R>,
    id: RecordId,
    default: String,
    watch: RecordWatch,
    started: bool,
}

impl<G, R> EditorStates<G, R>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    /// Waits for the next distinct record value and derives its state.
    ///
    /// Returns `None` only once the record store is gone.
    pub async fn next(&mut self) -> Option<Result<EditorState>> {
        if !self.started {
            self.started = true;
            let created = {
                let _guard = self.service.inner.locks.lock(&self.id).await;
                self.service.load_or_insert(self.id, &self.default).await
            };
            if let Err(e) = created {
                return Some(Err(e));
            }
        }

        let record = self.watch.next().await?;
        let sheet = Sheet::from_record(&record);
        let state = self
            .service
            .materialize(&sheet, &self.default)
            .await
            .map(|buffer| EditorState { sheet, buffer });
        Some(state)
    }
}
