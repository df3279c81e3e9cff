use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a storage location.
///
/// The core never looks inside a handle; only a [`StorageGateway`](crate::storage::StorageGateway)
/// knows how to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Handle {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Handle {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Stable id of a document record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cursor/selection state, in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn caret(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    pub fn is_caret(&self) -> bool {
        self.anchor == self.head
    }

    /// Clamps both ends to `len` characters.
    pub fn clamp(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

/// Persisted document record.
///
/// Exactly one of `inline_content` and `storage_ref` is populated: a record is
/// either self-contained or delegates its content to a storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub inline_content: Option<String>,
    #[serde(default)]
    pub storage_ref: Option<Handle>,
}

impl Record {
    pub fn inline(id: RecordId, content: impl Into<String>) -> Self {
        Self {
            id,
            inline_content: Some(content.into()),
            storage_ref: None,
        }
    }

    pub fn stored(id: RecordId, handle: Handle) -> Self {
        Self {
            id,
            inline_content: None,
            storage_ref: Some(handle),
        }
    }

    /// Rejects records that populate both or neither of the content fields.
    pub fn validate(&self) -> Result<()> {
        match (&self.inline_content, &self.storage_ref) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(ScribeError::InvalidOperation(format!(
                "record {} has both inline content and a storage reference",
                self.id
            ))),
            (None, None) => Err(ScribeError::InvalidOperation(format!(
                "record {} has neither inline content nor a storage reference",
                self.id
            ))),
        }
    }
}

/// The logical document a record describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sheet {
    /// Content lives in the record itself.
    Transient { id: RecordId, contents: String },
    /// Content lives at a storage location.
    Persisted { id: RecordId, handle: Handle },
}

impl Sheet {
    pub fn id(&self) -> RecordId {
        match self {
            Sheet::Transient { id, .. } | Sheet::Persisted { id, .. } => *id,
        }
    }

    pub fn handle(&self) -> Option<&Handle> {
        match self {
            Sheet::Transient { .. } => None,
            Sheet::Persisted { handle, .. } => Some(handle),
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Sheet::Persisted { .. })
    }

    /// Derives the sheet from a record. A blank storage reference counts as
    /// no reference at all.
    pub fn from_record(record: &Record) -> Self {
        match record.storage_ref.as_ref().filter(|h| !h.as_str().trim().is_empty()) {
            Some(handle) => Sheet::Persisted {
                id: record.id,
                handle: handle.clone(),
            },
            None => Sheet::Transient {
                id: record.id,
                contents: record.inline_content.clone().unwrap_or_default(),
            },
        }
    }

    pub fn to_record(&self) -> Record {
        match self {
            Sheet::Transient { id, contents } => Record::inline(*id, contents.clone()),
            Sheet::Persisted { id, handle } => Record::stored(*id, handle.clone()),
        }
    }
}
