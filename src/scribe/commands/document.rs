use super::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::Handle;
use crate::session::{SaveOutcome, SessionCoordinator};
use crate::storage::StorageGateway;

/// Prints the content of `handle`.
pub async fn cat<G: StorageGateway + 'static>(
    session: &SessionCoordinator<G>,
    handle: &Handle,
) -> Result<CmdResult> {
    let view = session.load(handle).await?;
    Ok(CmdResult::default().with_output(view.buffer.text()))
}

/// Opens `from` and saves it as `to`. The original file is left as it was.
pub async fn copy<G: StorageGateway + 'static>(
    session: &SessionCoordinator<G>,
    from: &Handle,
    to: &Handle,
) -> Result<CmdResult> {
    let view = session.load(from).await?;
    let bound = session.save_as(&view.buffer, to).await?;

    let mut result = CmdResult::default();
    if bound == view.buffer {
        result.add_message(CmdMessage::saved(SaveOutcome::NoOp, view.title()));
    } else {
        result.add_message(CmdMessage::success(format!(
            "Copied {} to {} ({} chars)",
            from,
            to,
            bound.len_chars()
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use crate::storage::memory::MemGateway;
    use std::sync::Arc;

    #[tokio::test]
    async fn cat_prints_content() {
        let gateway = Arc::new(MemGateway::new().with_file("a.txt", "alpha"));
        let session = SessionCoordinator::new(gateway);
        let result = cat(&session, &Handle::new("a.txt")).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("alpha"));
    }

    #[tokio::test]
    async fn copy_writes_target_and_keeps_source_binding() {
        let gateway = Arc::new(MemGateway::new().with_file("a.txt", "alpha"));
        let session = SessionCoordinator::new(gateway.clone());

        let result = copy(&session, &Handle::new("a.txt"), &Handle::new("b.txt"))
            .await
            .unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Success);
        assert_eq!(gateway.contents(&Handle::new("b.txt")).as_deref(), Some("alpha"));
        assert!(session.registry().get(&Handle::new("a.txt")).is_some());
        assert_eq!(session.registry().len(), 2);
    }

    #[tokio::test]
    async fn copy_onto_itself_is_noop() {
        let gateway = Arc::new(MemGateway::new().with_file("a.txt", "alpha"));
        let session = SessionCoordinator::new(gateway.clone());

        let result = copy(&session, &Handle::new("a.txt"), &Handle::new("a.txt"))
            .await
            .unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Info);
        assert_eq!(gateway.write_count(), 0);
    }
}
