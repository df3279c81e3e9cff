use super::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::{Handle, RecordId, Sheet};
use crate::records::RecordStore;
use crate::sheets::{EditorState, SheetService};
use crate::storage::StorageGateway;

fn describe(state: &EditorState) -> String {
    match &state.sheet {
        Sheet::Transient { id, .. } => format!("Sheet {} (unsaved)", id),
        Sheet::Persisted { id, handle } => format!("Sheet {} -> {}", id, handle),
    }
}

/// One line per known sheet: id, where its content lives, and its size.
pub async fn list<G, R>(sheets: &SheetService<G, R>) -> Result<CmdResult>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    let records = sheets.records().list().await?;
    let mut result = CmdResult::default();
    if records.is_empty() {
        result.add_message(CmdMessage::info("No sheets yet"));
        return Ok(result);
    }

    let lines: Vec<String> = records
        .iter()
        .map(|record| match Sheet::from_record(record) {
            Sheet::Transient { id, contents } => {
                format!("{:>4}  {} chars (unsaved)", id.to_string(), contents.chars().count())
            }
            Sheet::Persisted { id, handle } => format!("{:>4}  {}", id.to_string(), handle),
        })
        .collect();
    Ok(result.with_output(lines.join("\n")))
}

/// Prints a sheet's content, creating an empty sheet for unknown ids.
pub async fn show<G, R>(sheets: &SheetService<G, R>, id: RecordId) -> Result<CmdResult>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    let state = sheets.get_or_create(id, "").await?;
    Ok(CmdResult::default()
        .with_message(CmdMessage::info(describe(&state)))
        .with_output(state.buffer.text()))
}

/// Replaces (or, with `append`, extends) a sheet's text and saves it.
pub async fn write<G, R>(
    sheets: &SheetService<G, R>,
    id: RecordId,
    text: &str,
    append: bool,
) -> Result<CmdResult>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    let state = sheets.get_or_create(id, "").await?;
    if append {
        state.buffer.append(text);
    } else {
        state.buffer.replace_all(text);
    }
    let outcome = sheets.save(id).await?;
    Ok(CmdResult::default().with_message(CmdMessage::saved(outcome, describe(&state))))
}

pub async fn save_as<G, R>(
    sheets: &SheetService<G, R>,
    id: RecordId,
    handle: &Handle,
) -> Result<CmdResult>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    sheets.get_or_create(id, "").await?;
    let state = sheets.save_as(id, handle).await?;
    Ok(CmdResult::default().with_message(CmdMessage::success(describe(&state))))
}

/// Points a sheet at an existing file, replacing its text with the file's.
pub async fn attach<G, R>(
    sheets: &SheetService<G, R>,
    id: RecordId,
    handle: &Handle,
) -> Result<CmdResult>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    let state = sheets.replace_with_file(id, handle).await?;
    Ok(CmdResult::default().with_message(CmdMessage::success(describe(&state))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::memory::MemRecordStore;
    use crate::storage::memory::MemGateway;
    use std::sync::Arc;

    fn sheets() -> (SheetService<MemGateway, MemRecordStore>, Arc<MemGateway>) {
        let gateway = Arc::new(MemGateway::new());
        let service = SheetService::new(gateway.clone(), Arc::new(MemRecordStore::new()));
        (service, gateway)
    }

    #[tokio::test]
    async fn write_then_show() {
        let (sheets, _) = sheets();
        write(&sheets, RecordId(1), "hello", false).await.unwrap();
        write(&sheets, RecordId(1), " world", true).await.unwrap();

        let shown = show(&sheets, RecordId(1)).await.unwrap();
        assert_eq!(shown.output.as_deref(), Some("hello world"));
        assert_eq!(shown.messages[0].content, "Sheet #1 (unsaved)");
    }

    #[tokio::test]
    async fn save_as_then_write_goes_to_file() {
        let (sheets, gateway) = sheets();
        write(&sheets, RecordId(2), "v1", false).await.unwrap();
        let result = save_as(&sheets, RecordId(2), &Handle::new("s.txt"))
            .await
            .unwrap();
        assert_eq!(result.messages[0].content, "Sheet #2 -> s.txt");

        write(&sheets, RecordId(2), "v2", false).await.unwrap();
        assert_eq!(gateway.contents(&Handle::new("s.txt")).as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn list_shows_each_sheet() {
        let (sheets, _) = sheets();
        let empty = list(&sheets).await.unwrap();
        assert_eq!(empty.messages[0].content, "No sheets yet");

        write(&sheets, RecordId(1), "abc", false).await.unwrap();
        write(&sheets, RecordId(2), "x", false).await.unwrap();
        save_as(&sheets, RecordId(2), &Handle::new("two.txt"))
            .await
            .unwrap();

        let listed = list(&sheets).await.unwrap();
        assert_eq!(
            listed.output.as_deref(),
            Some("  #1  3 chars (unsaved)\n  #2  two.txt")
        );
    }

    #[tokio::test]
    async fn attach_reads_file() {
        let (sheets, gateway) = sheets();
        gateway.put("in.txt", "imported");
        attach(&sheets, RecordId(3), &Handle::new("in.txt"))
            .await
            .unwrap();
        let shown = show(&sheets, RecordId(3)).await.unwrap();
        assert_eq!(shown.output.as_deref(), Some("imported"));
    }
}
