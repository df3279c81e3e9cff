//! Shared fixtures for unit and integration tests.

use crate::api::ScribeApi;
use crate::config::ScribeConfig;
use crate::records::memory::MemRecordStore;
use crate::session::{SessionCoordinator, SessionOptions};
use crate::sheets::SheetService;
use crate::storage::memory::MemGateway;
use std::sync::Arc;

/// A coordinator over an in-memory gateway seeded with `files`.
pub fn mem_session(files: &[(&str, &str)]) -> (SessionCoordinator<MemGateway>, Arc<MemGateway>) {
    let gateway = Arc::new(seeded_gateway(files));
    (SessionCoordinator::new(gateway.clone()), gateway)
}

/// A sheet service over in-memory backends.
pub fn mem_sheets(
    files: &[(&str, &str)],
) -> (
    SheetService<MemGateway, MemRecordStore>,
    Arc<MemGateway>,
    Arc<MemRecordStore>,
) {
    let gateway = Arc::new(seeded_gateway(files));
    let records = Arc::new(MemRecordStore::new());
    (
        SheetService::new(gateway.clone(), records.clone()),
        gateway,
        records,
    )
}

/// The whole API over in-memory backends with default config.
pub fn mem_api(files: &[(&str, &str)]) -> (ScribeApi<MemGateway, MemRecordStore>, Arc<MemGateway>) {
    let gateway = Arc::new(seeded_gateway(files));
    let api = ScribeApi::new(
        gateway.clone(),
        Arc::new(MemRecordStore::new()),
        ScribeConfig::default(),
        SessionOptions::default(),
    );
    (api, gateway)
}

pub fn seeded_gateway(files: &[(&str, &str)]) -> MemGateway {
    crate::logging::test();
    let gateway = MemGateway::new();
    for (handle, content) in files {
        gateway.put(*handle, content);
    }
    gateway
}
