//! # Session Coordinator
//!
//! Drives the single active editing session over a [`StorageGateway`]:
//! load, save in place, save-as, new document, and restoring the last opened
//! file. The current session is an observable value ([`SessionView`]) that
//! every transition updates through `watch::Sender::send_if_modified`.
//!
//! ## Ordering
//!
//! - Operations touching the same handle are serialized by a per-handle lock.
//!   Save-as locks its source and target handles together, in sorted order.
//! - A buffer is serialized only once its handle's lock is held, so a save
//!   always writes the text as of the moment it actually runs.
//! - Load and new-document take a ticket when they start. A transition only
//!   publishes if no later-started transition already has, so a slow load
//!   that finishes late still caches its buffer but never clobbers the
//!   session the user moved on to.
//! - Save-as only moves the session to the new buffer if the session still
//!   shows the buffer that was saved.
//!
//! ## Failure
//!
//! Every operation either completes or leaves bindings, fingerprints and the
//! session exactly as they were. Nothing is retried.

use crate::autosave::{Debouncer, DEFAULT_AUTOSAVE_DELAY};
use crate::buffer::{Buffer, BufferId};
use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::locks::KeyedLocks;
use crate::model::Handle;
use crate::registry::BufferRegistry;
use crate::settings::SettingsStore;
use crate::storage::StorageGateway;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Snapshot of the active session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub buffer: Buffer,
    pub handle: Option<Handle>,
    pub display_name: Option<String>,
    /// Last successful persist of this buffer during the session, kept
    /// across reopening it.
    pub saved_at: Option<DateTime<Utc>>,
    /// Ticket of the load/new-document that produced this session.
    pub generation: u64,
}

impl SessionView {
    fn untitled(buffer: Buffer, generation: u64) -> Self {
        Self {
            buffer,
            handle: None,
            display_name: None,
            saved_at: None,
            generation,
        }
    }

    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Untitled")
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Content matched the last persisted fingerprint; nothing was written.
    NoOp,
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::Written => f.write_str("saved"),
            SaveOutcome::NoOp => f.write_str("unchanged"),
        }
    }
}

#[derive(Clone)]
pub struct SessionOptions {
    pub autosave_delay: Duration,
    pub settings: Option<Arc<SettingsStore>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            settings: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &ScribeConfig) -> Self {
        Self {
            autosave_delay: config.autosave_delay(),
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }
}

struct Inner<G> {
    gateway: Arc<G>,
    registry: BufferRegistry<Handle>,
    session: watch::Sender<SessionView>,
    tickets: AtomicU64,
    locks: KeyedLocks<Handle>,
    autosave: Debouncer<BufferId>,
    autosave_delay: Duration,
    settings: Option<Arc<SettingsStore>>,
    saved_times: DashMap<BufferId, DateTime<Utc>>,
}

pub struct SessionCoordinator<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for SessionCoordinator<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: StorageGateway + 'static> SessionCoordinator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_options(gateway, SessionOptions::default())
    }

    pub fn with_options(gateway: Arc<G>, options: SessionOptions) -> Self {
        let (session, _) = watch::channel(SessionView::untitled(Buffer::empty(), 0));
        Self {
            inner: Arc::new(Inner {
                gateway,
                registry: BufferRegistry::new(),
                session,
                tickets: AtomicU64::new(1),
                locks: KeyedLocks::new(),
                autosave: Debouncer::new(),
                autosave_delay: options.autosave_delay,
                settings: options.settings,
                saved_times: DashMap::new(),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner<G>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.inner.gateway
    }

    pub fn registry(&self) -> &BufferRegistry<Handle> {
        &self.inner.registry
    }

    pub fn current(&self) -> SessionView {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.session.subscribe()
    }

    fn next_ticket(&self) -> u64 {
        self.inner.tickets.fetch_add(1, Ordering::SeqCst)
    }

    /// Publishes `view` unless a later-started transition already did.
    fn publish(&self, view: &SessionView) -> bool {
        self.inner.session.send_if_modified(|current| {
            if current.generation >= view.generation {
                return false;
            }
            *current = view.clone();
            true
        })
    }

    async fn display_name(&self, handle: &Handle) -> String {
        match self.inner.gateway.display_name(handle).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(%handle, error = %e, "display name lookup failed");
                handle.to_string()
            }
        }
    }

    async fn remember(&self, handle: Option<Handle>) {
        if let Some(settings) = &self.inner.settings {
            if let Err(e) = settings.store_last_file(handle).await {
                tracing::warn!(error = %e, "could not store last opened file");
            }
        }
    }

    /// Makes the document at `handle` the current session.
    ///
    /// Reuses the bound buffer when there is one; otherwise reads storage once
    /// (concurrent loads of the same handle share the read).
    pub async fn load(&self, handle: &Handle) -> Result<SessionView> {
        let ticket = self.next_ticket();

        let buffer = {
            let _guard = self.inner.locks.lock(handle).await;
            let gateway = Arc::clone(&self.inner.gateway);
            let key = handle.clone();
            self.inner
                .registry
                .get_or_create(handle, move || async move { gateway.read(&key).await })
                .await?
        };

        let saved_at = self.saved_at(&buffer);
        let view = SessionView {
            buffer,
            handle: Some(handle.clone()),
            display_name: Some(self.display_name(handle).await),
            saved_at,
            generation: ticket,
        };

        if self.publish(&view) {
            tracing::info!(%handle, buffer = %view.buffer.id(), "loaded");
            self.remember(Some(handle.clone())).await;
        } else {
            tracing::debug!(%handle, "load finished after a newer transition; not published");
        }
        Ok(view)
    }

    /// Writes `buffer` back to the handle it is bound to, unless its content
    /// matches what was last persisted there.
    pub async fn save_in_place(&self, buffer: &Buffer) -> Result<SaveOutcome> {
        self.inner.autosave.cancel(&buffer.id());

        let (handle, _guard) = loop {
            let handle = self.bound_handle(buffer)?;
            let guard = self.inner.locks.lock(&handle).await;
            // The buffer may have been rebound while we waited.
            if self.inner.registry.reverse_lookup(buffer).as_ref() == Some(&handle) {
                break (handle, guard);
            }
        };

        let content = buffer.text();
        if self.inner.registry.fingerprint_matches(&handle, &content) {
            tracing::debug!(%handle, "content unchanged, skipping write");
            return Ok(SaveOutcome::NoOp);
        }

        self.inner.gateway.write(&handle, &content).await?;
        self.inner.registry.record_fingerprint(&handle, &content);
        tracing::info!(%handle, bytes = content.len(), "saved");

        self.mark_saved(buffer);
        Ok(SaveOutcome::Written)
    }

    /// Saves the current session buffer in place.
    pub async fn save(&self) -> Result<SaveOutcome> {
        let buffer = self.current().buffer;
        self.save_in_place(&buffer).await
    }

    /// Whether `buffer` holds text that has not been persisted anywhere.
    pub fn is_modified(&self, buffer: &Buffer) -> bool {
        match self.inner.registry.reverse_lookup(buffer) {
            Some(handle) => !self
                .inner
                .registry
                .fingerprint_matches(&handle, &buffer.text()),
            None => !buffer.is_empty(),
        }
    }

    fn bound_handle(&self, buffer: &Buffer) -> Result<Handle> {
        self.inner.registry.reverse_lookup(buffer).ok_or_else(|| {
            ScribeError::InvalidOperation(
                "document has no storage location yet; use save-as".to_string(),
            )
        })
    }

    fn saved_at(&self, buffer: &Buffer) -> Option<DateTime<Utc>> {
        self.inner.saved_times.get(&buffer.id()).map(|at| *at)
    }

    fn mark_saved(&self, buffer: &Buffer) -> bool {
        let now = Utc::now();
        self.inner.saved_times.insert(buffer.id(), now);
        self.inner.session.send_if_modified(|current| {
            if current.buffer != *buffer {
                return false;
            }
            current.saved_at = Some(now);
            true
        })
    }

    /// Writes `buffer` to `target` and binds the result there.
    ///
    /// - An unbound buffer is bound to `target` itself.
    /// - A buffer bound to another handle is copied (content and selection);
    ///   the copy is bound to `target` and the original binding stays.
    /// - Whatever buffer was bound to `target` before is evicted.
    /// - Saving to the buffer's own handle is a plain in-place save.
    ///
    /// Returns the buffer now bound to `target`. The session follows it only
    /// if it was still showing `buffer`.
    pub async fn save_as(&self, buffer: &Buffer, target: &Handle) -> Result<Buffer> {
        let _guards = loop {
            let source = self.inner.registry.reverse_lookup(buffer);
            if source.as_ref() == Some(target) {
                self.save_in_place(buffer).await?;
                return Ok(buffer.clone());
            }

            let mut keys = vec![target];
            if let Some(source) = &source {
                keys.push(source);
            }
            let guards = self.inner.locks.lock_all(&keys).await;
            if self.inner.registry.reverse_lookup(buffer) == source {
                break guards;
            }
        };

        let content = buffer.text();
        self.inner.gateway.write(target, &content).await?;

        let (bound, evicted) = self
            .inner
            .registry
            .bind_or_fork(target.clone(), buffer, &content);
        if let Some(evicted) = evicted.filter(|e| *e != bound) {
            self.inner.saved_times.remove(&evicted.id());
            tracing::warn!(
                handle = %target,
                evicted = %evicted.id(),
                "overwrote a document that was open under the same handle"
            );
        }
        tracing::info!(handle = %target, buffer = %bound.id(), forked = bound != *buffer, "saved as");

        let display_name = self.display_name(target).await;
        let now = Utc::now();
        self.inner.saved_times.insert(bound.id(), now);
        let moved = self.inner.session.send_if_modified(|current| {
            if current.buffer != *buffer {
                return false;
            }
            current.buffer = bound.clone();
            current.handle = Some(target.clone());
            current.display_name = Some(display_name.clone());
            current.saved_at = Some(now);
            true
        });
        if moved {
            self.remember(Some(target.clone())).await;
        }

        Ok(bound)
    }

    /// Starts a fresh, unbound, empty document. Existing bindings stay.
    pub async fn new_document(&self) -> SessionView {
        let view = SessionView::untitled(Buffer::empty(), self.next_ticket());
        if self.publish(&view) {
            tracing::debug!(buffer = %view.buffer.id(), "new document");
            self.remember(None).await;
        }
        view
    }

    /// Reopens the last file recorded in settings, if any.
    ///
    /// A file that can no longer be read is forgotten and the session stays
    /// on the empty document.
    pub async fn restore_last(&self) -> Result<SessionView> {
        let Some(settings) = &self.inner.settings else {
            return Ok(self.current());
        };
        let Some(handle) = settings.last_file() else {
            return Ok(self.current());
        };

        match self.load(&handle).await {
            Ok(view) => Ok(view),
            Err(e) => {
                tracing::warn!(%handle, error = %e, "could not reopen last file");
                settings.store_last_file(None).await?;
                Ok(self.current())
            }
        }
    }

    /// Schedules an in-place save of `buffer` after the autosave delay,
    /// replacing any pending one. Unbound buffers have nowhere to go and are
    /// skipped.
    pub fn schedule_autosave(&self, buffer: &Buffer) {
        if self.inner.registry.reverse_lookup(buffer).is_none() {
            tracing::debug!(buffer = %buffer.id(), "not autosaving unbound buffer");
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let target = buffer.clone();
        self.inner
            .autosave
            .schedule(buffer.id(), self.inner.autosave_delay, async move {
                let Some(coordinator) = Self::from_weak(&weak) else {
                    return;
                };
                match coordinator.save_in_place(&target).await {
                    Ok(outcome) => tracing::debug!(buffer = %target.id(), %outcome, "autosave"),
                    Err(e) => tracing::warn!(buffer = %target.id(), error = %e, "autosave failed"),
                }
            });
    }

    pub fn autosave_pending(&self, buffer: &Buffer) -> bool {
        self.inner.autosave.is_pending(&buffer.id())
    }

    /// Follows `buffer`'s edit stream, scheduling an autosave after every edit.
    pub fn track_edits(&self, buffer: &Buffer) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let buffer = buffer.clone();
        let mut edits = buffer.subscribe();
        edits.borrow_and_update();

        tokio::spawn(async move {
            while edits.changed().await.is_ok() {
                let Some(coordinator) = Self::from_weak(&weak) else {
                    return;
                };
                coordinator.schedule_autosave(&buffer);
            }
        })
    }

    /// Autosaves whatever buffer the session currently shows, switching over
    /// whenever the session moves to another buffer. Runs until aborted or
    /// the coordinator is dropped.
    pub fn spawn_autosave(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut session = self.subscribe();
        let mut buffer = session.borrow_and_update().buffer.clone();
        let mut edits = buffer.subscribe();
        edits.borrow_and_update();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = session.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let next = session.borrow_and_update().buffer.clone();
                        if next != buffer {
                            buffer = next;
                            edits = buffer.subscribe();
                            edits.borrow_and_update();
                        }
                    }
                    changed = edits.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let Some(coordinator) = Self::from_weak(&weak) else {
                            return;
                        };
                        coordinator.schedule_autosave(&buffer);
                    }
                }
            }
        })
    }
}
