//! # Storage Gateway
//!
//! Raw text I/O against opaque storage handles. The [`StorageGateway`] trait is
//! the only place the core touches user-chosen storage; everything above it
//! works on [`Handle`]s and strings.
//!
//! ## Implementations
//!
//! - [`fs::FsGateway`]: production gateway over a directory on disk.
//!   - Relative handles resolve under the gateway root, absolute ones as-is
//!   - Writes are atomic (temp file in the same directory, then rename)
//! - [`memory::MemGateway`]: in-memory gateway for tests
//!   - Counts reads and writes
//!   - Can inject write failures, denied handles and latency
//!
//! ## Error Mapping
//!
//! | Condition              | Error                            |
//! |------------------------|----------------------------------|
//! | handle does not exist  | `ScribeError::NotFound`          |
//! | access refused         | `ScribeError::PermissionDenied`  |
//! | anything else          | `ScribeError::Io` / `Storage`    |
//!
//! Gateways never retry; the coordinator surfaces every failure to its caller.

use crate::error::Result;
use crate::model::Handle;
use async_trait::async_trait;

pub mod fs;
pub mod memory;

/// Abstract interface for document content storage.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Read the full content behind `handle`.
    async fn read(&self, handle: &Handle) -> Result<String>;

    /// Replace the content behind `handle`, creating it if needed.
    async fn write(&self, handle: &Handle, content: &str) -> Result<()>;

    /// Human-readable name for `handle` (e.g. a file name).
    async fn display_name(&self, handle: &Handle) -> Result<String>;
}
