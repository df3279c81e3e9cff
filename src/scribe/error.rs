use crate::model::{Handle, RecordId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Document not found: {0}")]
    NotFound(Handle),

    #[error("Permission denied: {0}")]
    PermissionDenied(Handle),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl ScribeError {
    /// Maps an I/O error raised while touching `handle` onto the storage taxonomy.
    pub fn from_io(handle: &Handle, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ScribeError::NotFound(handle.clone()),
            std::io::ErrorKind::PermissionDenied => ScribeError::PermissionDenied(handle.clone()),
            _ => ScribeError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
