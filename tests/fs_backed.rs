use scribe::model::{Handle, Record, RecordId};
use scribe::records::json::JsonRecordStore;
use scribe::records::RecordStore;
use scribe::session::{SaveOutcome, SessionCoordinator, SessionOptions};
use scribe::settings::SettingsStore;
use scribe::sheets::SheetService;
use scribe::storage::fs::FsGateway;
use scribe::storage::StorageGateway;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn h(name: &str) -> Handle {
    Handle::new(name)
}

#[tokio::test]
async fn gateway_round_trip_and_display_name() {
    let dir = TempDir::new().unwrap();
    let gateway = FsGateway::new(dir.path());

    gateway
        .write(&h("nested/dir/note.md"), "# Title\nbody")
        .await
        .unwrap();
    assert_eq!(
        gateway.read(&h("nested/dir/note.md")).await.unwrap(),
        "# Title\nbody"
    );
    assert_eq!(
        gateway.display_name(&h("nested/dir/note.md")).await.unwrap(),
        "note.md"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("nested/dir/note.md")).unwrap(),
        "# Title\nbody"
    );
}

#[tokio::test]
async fn session_edits_land_on_disk_without_tmp_leftovers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "one").unwrap();
    let session = SessionCoordinator::new(Arc::new(FsGateway::new(dir.path())));

    let view = session.load(&h("a.txt")).await.unwrap();
    view.buffer.append("\ntwo");
    assert_eq!(session.save().await.unwrap(), SaveOutcome::Written);
    session.save_as(&view.buffer, &h("b.txt")).await.unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "one\ntwo"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("b.txt")).unwrap(),
        "one\ntwo"
    );
    for entry in fs::read_dir(dir.path()).unwrap() {
        let name = entry.unwrap().file_name().to_string_lossy().into_owned();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[tokio::test]
async fn last_file_is_restored_across_coordinators() {
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    fs::write(root.path().join("journal.txt"), "day one").unwrap();

    {
        let settings = Arc::new(SettingsStore::open(data.path()).await.unwrap());
        let session = SessionCoordinator::with_options(
            Arc::new(FsGateway::new(root.path())),
            SessionOptions::default().with_settings(settings),
        );
        session.load(&h("journal.txt")).await.unwrap();
    }

    let settings = Arc::new(SettingsStore::open(data.path()).await.unwrap());
    let session = SessionCoordinator::with_options(
        Arc::new(FsGateway::new(root.path())),
        SessionOptions::default().with_settings(settings),
    );
    let view = session.restore_last().await.unwrap();
    assert_eq!(view.buffer.text(), "day one");
    assert_eq!(view.title(), "journal.txt");
}

#[tokio::test]
async fn unchanged_record_rederives_same_buffer() {
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let records = Arc::new(JsonRecordStore::open(data.path()).await.unwrap());
    let sheets = SheetService::new(Arc::new(FsGateway::new(root.path())), records.clone());

    let first = sheets.get_or_create(RecordId(1), "seed").await.unwrap();
    let again = sheets.get_or_create(RecordId(1), "seed").await.unwrap();
    assert_eq!(first, again);

    // Re-writing the same record is not a change; a real change re-derives
    // the state but keeps the buffer.
    let mut states = sheets.subscribe(RecordId(1), "seed");
    let initial = states.next().await.unwrap().unwrap();
    assert_eq!(initial.buffer, first.buffer);

    records
        .update(Record::inline(RecordId(1), "seed"))
        .await
        .unwrap();
    sheets.save_as(RecordId(1), &h("sheet.txt")).await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(1), states.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(next.sheet.is_persisted());
    assert_eq!(next.buffer, first.buffer);
    assert_eq!(
        fs::read_to_string(root.path().join("sheet.txt")).unwrap(),
        "seed"
    );
}

#[tokio::test]
async fn sheet_records_persist_in_json() {
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    {
        let records = Arc::new(JsonRecordStore::open(data.path()).await.unwrap());
        let sheets = SheetService::new(Arc::new(FsGateway::new(root.path())), records);
        let state = sheets.get_or_create(RecordId(7), "").await.unwrap();
        state.buffer.append("kept");
        sheets.save(RecordId(7)).await.unwrap();
    }

    let records = Arc::new(JsonRecordStore::open(data.path()).await.unwrap());
    let sheets = SheetService::new(Arc::new(FsGateway::new(root.path())), records);
    let state = sheets.get_or_create(RecordId(7), "").await.unwrap();
    assert_eq!(state.buffer.text(), "kept");
}
