//! # Scribe Architecture
//!
//! Scribe keeps live editing sessions for text documents. A document is either
//! backed by a user-chosen storage location (a file) or held only in an
//! internal record (an unsaved "sheet"). For every logical document there is
//! exactly one authoritative in-memory [`Buffer`](buffer::Buffer), and scribe
//! decides when that buffer has to be written back.
//!
//! Like any UI-agnostic core, it is a library that happens to have a CLI.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (args.rs, main.rs)                                     │
//! │  - Parses arguments, prints results, owns exit codes        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API facade (api.rs) and commands (commands/*.rs)           │
//! │  - Normalize inputs, return CmdResult, never print          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Coordination (session.rs, sheets.rs, autosave.rs)          │
//! │  - Load / save / save-as / new document state transitions   │
//! │  - Per-key ordering, debounced autosave                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Buffer registry (registry.rs)                              │
//! │  - key <-> buffer bijection, last-saved fingerprints        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (storage/) and records (records/)                  │
//! │  - StorageGateway: FsGateway (production), MemGateway       │
//! │  - RecordStore: JsonRecordStore (production), MemRecordStore│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dirty Tracking
//!
//! The registry stores a SHA-256 fingerprint of what was last read from or
//! written to each key. A save whose content hashes to that fingerprint is a
//! no-op ([`SaveOutcome::NoOp`](session::SaveOutcome)), so saving twice, or
//! autosaving an untouched document, never hits storage.
//!
//! ## Testing Strategy
//!
//! 1. **Leaf modules** (`storage/`, `records/`, `registry.rs`, `buffer.rs`):
//!    unit tests next to the code, using the in-memory backends.
//! 2. **Coordination**: unit tests in `session.rs` and `sheets.rs` with
//!    failure injection and latency from `MemGateway`. Timing-sensitive
//!    autosave tests run on tokio's paused clock.
//! 3. **End to end** (`tests/`): filesystem-backed sessions and the `scribe`
//!    binary driven through `assert_cmd`.
//!
//! ## Module Overview
//!
//! - [`model`]: handles, record ids, records, sheets, selections
//! - [`buffer`]: buffers and their edit streams
//! - [`fingerprint`]: content hashes
//! - [`registry`]: the buffer registry
//! - [`storage`], [`records`]: the two persistence seams
//! - [`session`], [`sheets`], [`autosave`], [`locks`]: coordination
//! - [`settings`], [`config`], [`logging`], [`error`]: ambient plumbing
//! - [`api`], [`commands`]: the UI-facing surface

pub mod api;
pub mod autosave;
pub mod buffer;
pub mod commands;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod locks;
pub mod logging;
pub mod model;
pub mod records;
pub mod registry;
pub mod session;
pub mod settings;
pub mod sheets;
pub mod storage;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
