//! In-memory editable text buffers.
//!
//! A [`Buffer`] is a shared reference: clones point at the same underlying
//! text, and equality is identity. Every edit bumps a revision counter that is
//! published on the buffer's edit stream (see [`Buffer::subscribe`]).

use crate::model::Selection;
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Process-unique identity of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(Uuid);

impl BufferId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Point-in-time copy of a buffer's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub text: String,
    pub selection: Selection,
    pub revision: u64,
}

struct BufferState {
    text: String,
    selection: Selection,
    revision: u64,
}

struct BufferInner {
    id: BufferId,
    state: RwLock<BufferState>,
    edits: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_selection(content, Selection::default())
    }

    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn with_selection(content: impl Into<String>, selection: Selection) -> Self {
        let text = content.into();
        let len = text.chars().count();
        let (edits, _) = watch::channel(0);
        Self {
            inner: Arc::new(BufferInner {
                id: BufferId::new(),
                state: RwLock::new(BufferState {
                    text,
                    selection: selection.clamp(len),
                    revision: 0,
                }),
                edits,
            }),
        }
    }

    /// A new buffer (new identity) carrying the same text and selection.
    pub fn duplicate(&self) -> Self {
        let state = self.inner.state.read();
        Self::with_selection(state.text.clone(), state.selection)
    }

    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    /// Serializes the buffer's current content.
    pub fn text(&self) -> String {
        self.inner.state.read().text.clone()
    }

    pub fn len_chars(&self) -> usize {
        self.inner.state.read().text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().text.is_empty()
    }

    pub fn selection(&self) -> Selection {
        self.inner.state.read().selection
    }

    pub fn revision(&self) -> u64 {
        self.inner.state.read().revision
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.inner.state.read();
        BufferSnapshot {
            text: state.text.clone(),
            selection: state.selection,
            revision: state.revision,
        }
    }

    /// Receives the revision after every edit.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.edits.subscribe()
    }

    pub fn set_selection(&self, selection: Selection) {
        let mut state = self.inner.state.write();
        let len = state.text.chars().count();
        state.selection = selection.clamp(len);
    }

    /// Replaces the whole text. The selection is clamped to the new length.
    pub fn replace_all(&self, text: impl Into<String>) -> u64 {
        let text = text.into();
        self.apply(|state| {
            let len = text.chars().count();
            state.text = text;
            state.selection = state.selection.clamp(len);
        })
    }

    /// Inserts `text` at character offset `at` (clamped to the end) and moves
    /// the caret after it.
    pub fn insert(&self, at: usize, text: &str) -> u64 {
        self.apply(|state| {
            let byte = byte_offset(&state.text, at);
            state.text.insert_str(byte, text);
            let caret = state.text[..byte].chars().count() + text.chars().count();
            state.selection = Selection::caret(caret);
        })
    }

    pub fn append(&self, text: &str) -> u64 {
        self.insert(usize::MAX, text)
    }

    /// Deletes the characters in `range` (clamped).
    pub fn delete(&self, range: Range<usize>) -> u64 {
        self.apply(|state| {
            let start = byte_offset(&state.text, range.start);
            let end = byte_offset(&state.text, range.end.max(range.start));
            state.text.replace_range(start..end, "");
            let caret = state.text[..start].chars().count();
            state.selection = Selection::caret(caret);
        })
    }

    fn apply(&self, edit: impl FnOnce(&mut BufferState)) -> u64 {
        let revision = {
            let mut state = self.inner.state.write();
            edit(&mut state);
            state.revision += 1;
            state.revision
        };
        self.inner.edits.send_replace(revision);
        revision
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Buffer {}

impl Hash for Buffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Buffer")
            .field("id", &self.inner.id)
            .field("len", &state.text.len())
            .field("revision", &state.revision)
            .finish()
    }
}
