use scribe::buffer::Buffer;
use scribe::error::ScribeError;
use scribe::model::{Handle, Selection};
use scribe::session::{SaveOutcome, SessionCoordinator};
use scribe::storage::memory::MemGateway;
use std::sync::Arc;
use std::time::Duration;

fn h(name: &str) -> Handle {
    Handle::new(name)
}

fn coordinator(files: &[(&str, &str)]) -> (SessionCoordinator<MemGateway>, Arc<MemGateway>) {
    let gateway = MemGateway::new();
    for (handle, content) in files {
        gateway.put(*handle, content);
    }
    let gateway = Arc::new(gateway);
    (SessionCoordinator::new(gateway.clone()), gateway)
}

#[tokio::test]
async fn saving_twice_without_edits_writes_once() {
    let (session, gateway) = coordinator(&[("a.txt", "base")]);
    let view = session.load(&h("a.txt")).await.unwrap();
    view.buffer.append(" + edit");

    assert_eq!(
        session.save_in_place(&view.buffer).await.unwrap(),
        SaveOutcome::Written
    );
    assert_eq!(
        session.save_in_place(&view.buffer).await.unwrap(),
        SaveOutcome::NoOp
    );
    assert_eq!(gateway.write_count(), 1);
}

#[tokio::test]
async fn save_as_from_bound_buffer_duplicates() {
    let (session, gateway) = coordinator(&[("fileA", "hello")]);
    let view = session.load(&h("fileA")).await.unwrap();
    view.buffer.set_selection(Selection::caret(3));

    let copy = session.save_as(&view.buffer, &h("fileB")).await.unwrap();

    assert_ne!(copy, view.buffer);
    assert_eq!(copy.text(), "hello");
    assert_eq!(copy.selection(), Selection::caret(3));
    assert_eq!(session.registry().get(&h("fileA")), Some(view.buffer.clone()));
    assert_eq!(session.registry().get(&h("fileB")), Some(copy.clone()));
    assert_eq!(gateway.contents(&h("fileB")).as_deref(), Some("hello"));
    assert_eq!(session.current().buffer, copy);

    // The two documents are independent from here on.
    copy.append(" B");
    assert_eq!(view.buffer.text(), "hello");
}

#[tokio::test]
async fn first_save_binds_the_same_buffer() {
    let (session, gateway) = coordinator(&[]);
    let buffer = session.current().buffer;
    buffer.append("draft");

    let bound = session.save_as(&buffer, &h("fileX")).await.unwrap();

    assert_eq!(bound, buffer);
    assert_eq!(session.registry().reverse_lookup(&buffer), Some(h("fileX")));
    assert!(session.registry().fingerprint_matches(&h("fileX"), "draft"));
    assert_eq!(gateway.contents(&h("fileX")).as_deref(), Some("draft"));
    assert_eq!(session.save().await.unwrap(), SaveOutcome::NoOp);
}

#[tokio::test]
async fn save_as_onto_open_document_evicts_it() {
    let (session, gateway) = coordinator(&[("target.txt", "old")]);
    let old = session.load(&h("target.txt")).await.unwrap().buffer;

    let incoming = Buffer::new("new");
    let bound = session.save_as(&incoming, &h("target.txt")).await.unwrap();

    assert_eq!(bound, incoming);
    assert_eq!(session.registry().get(&h("target.txt")), Some(incoming));
    assert!(session.registry().reverse_lookup(&old).is_none());
    assert_eq!(gateway.contents(&h("target.txt")).as_deref(), Some("new"));
    assert!(session.registry().is_consistent());
}

#[tokio::test]
async fn failed_save_as_leaves_everything_unchanged() {
    let (session, gateway) = coordinator(&[("a.txt", "alpha")]);
    let view = session.load(&h("a.txt")).await.unwrap();
    view.buffer.replace_all("beta");
    gateway.deny("locked.txt");

    let err = session
        .save_as(&view.buffer, &h("locked.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScribeError::PermissionDenied(_)));

    assert_eq!(session.registry().keys(), vec![h("a.txt")]);
    assert!(session.registry().fingerprint_matches(&h("a.txt"), "alpha"));
    assert_eq!(session.current().buffer, view.buffer);
    assert_eq!(session.current().handle, Some(h("a.txt")));
}

#[tokio::test]
async fn bijection_survives_mixed_operations() {
    let (session, _) = coordinator(&[("a", "1"), ("b", "2"), ("c", "3")]);
    let a = session.load(&h("a")).await.unwrap().buffer;
    let b = session.load(&h("b")).await.unwrap().buffer;

    session.save_as(&a, &h("b")).await.unwrap();
    session.save_as(&b, &h("c")).await.unwrap();
    let fresh = session.new_document().await.buffer;
    session.save_as(&fresh, &h("a")).await.unwrap();
    session.load(&h("c")).await.unwrap();
    session.save_as(&fresh, &h("d")).await.unwrap();

    assert!(session.registry().is_consistent());
    let keys = session.registry().keys();
    for key in &keys {
        let buffer = session.registry().get(key).unwrap();
        assert_eq!(session.registry().reverse_lookup(&buffer).as_ref(), Some(key));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loads_read_once() {
    let (session, gateway) = coordinator(&[("shared.txt", "content")]);
    gateway.set_latency(Some(Duration::from_millis(30)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            session.load(&Handle::new("shared.txt")).await.unwrap().buffer
        }));
    }
    let mut buffers = Vec::new();
    for task in tasks {
        buffers.push(task.await.unwrap());
    }

    assert_eq!(gateway.read_count(), 1);
    assert!(buffers.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_of_one_buffer_write_once() {
    let (session, gateway) = coordinator(&[("a.txt", "v1")]);
    gateway.set_latency(Some(Duration::from_millis(20)));
    let buffer = session.load(&h("a.txt")).await.unwrap().buffer;
    buffer.replace_all("v2");

    let first = {
        let session = session.clone();
        let buffer = buffer.clone();
        tokio::spawn(async move { session.save_in_place(&buffer).await.unwrap() })
    };
    let second = {
        let session = session.clone();
        let buffer = buffer.clone();
        tokio::spawn(async move { session.save_in_place(&buffer).await.unwrap() })
    };

    let mut outcomes = vec![first.await.unwrap(), second.await.unwrap()];
    outcomes.sort_by_key(|o| *o == SaveOutcome::NoOp);
    assert_eq!(outcomes, vec![SaveOutcome::Written, SaveOutcome::NoOp]);
    assert_eq!(gateway.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn autosave_fires_once_after_last_edit() {
    let (session, gateway) = coordinator(&[("a.txt", "")]);
    let view = session.load(&h("a.txt")).await.unwrap();
    let autosave = session.spawn_autosave();

    view.buffer.append("first");
    tokio::time::sleep(Duration::from_millis(200)).await;
    view.buffer.append(" second");

    tokio::time::sleep(Duration::from_millis(499)).await;
    assert_eq!(gateway.write_count(), 0, "nothing before t=700ms");

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(gateway.write_count(), 1);
    assert_eq!(
        gateway.contents(&h("a.txt")).as_deref(),
        Some("first second")
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(gateway.write_count(), 1);
    autosave.abort();
}

#[tokio::test(start_paused = true)]
async fn autosave_follows_session_switch() {
    let (session, gateway) = coordinator(&[("a.txt", "a"), ("b.txt", "b")]);
    let autosave = session.spawn_autosave();
    session.load(&h("a.txt")).await.unwrap();
    let b = session.load(&h("b.txt")).await.unwrap().buffer;
    tokio::task::yield_now().await;

    b.append("!");
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(gateway.contents(&h("b.txt")).as_deref(), Some("b!"));
    assert_eq!(gateway.write_count(), 1);
    autosave.abort();
}

#[tokio::test(start_paused = true)]
async fn tracked_buffer_autosaves_without_session() {
    let (session, gateway) = coordinator(&[("a.txt", "a"), ("b.txt", "b")]);
    let a = session.load(&h("a.txt")).await.unwrap().buffer;
    session.load(&h("b.txt")).await.unwrap();
    let tracker = session.track_edits(&a);

    a.append("1");
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(gateway.contents(&h("a.txt")).as_deref(), Some("a1"));
    tracker.abort();
}
