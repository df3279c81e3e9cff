//! Line commands for the interactive `session` subcommand.
//!
//! Each line is one command: `open <file>`, `append <text>`, `set <text>`,
//! `show`, `status`, `save`, `save-as <file>`, `new`, `help`, `quit`.
//! In text arguments `\n` stands for a line break.

use super::{CmdMessage, CmdResult};
use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::model::Handle;
use crate::session::SessionCoordinator;
use crate::storage::StorageGateway;

pub const HELP: &str = "\
open <file>      open a file (reuses it if already open)
append <text>    append text to the current document
set <text>       replace the current document's text
show             print the current document
status           show the document name and whether it has unsaved changes
save             save the current document in place
save-as <file>   save the current document to another file
new              start a new, empty document
quit             leave the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Open(Handle),
    Append(String),
    Set(String),
    Show,
    Status,
    Save,
    SaveAs(String),
    New,
    Help,
    Quit,
}

fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn required<'a>(verb: &str, arg: Option<&'a str>) -> Result<&'a str> {
    arg.filter(|a| !a.trim().is_empty())
        .map(str::trim)
        .ok_or_else(|| ScribeError::InvalidOperation(format!("{} needs an argument", verb)))
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let trimmed = line.trim_start();
    let (verb, arg) = match trimmed.split_once(' ') {
        Some((verb, rest)) => (verb, Some(rest)),
        None => (trimmed, None),
    };

    let command = match verb {
        "open" | "o" => ReplCommand::Open(Handle::new(required(verb, arg)?)),
        "append" | "a" => ReplCommand::Append(unescape(arg.unwrap_or_default())),
        "set" => ReplCommand::Set(unescape(arg.unwrap_or_default())),
        "show" | "cat" => ReplCommand::Show,
        "status" | "st" => ReplCommand::Status,
        "save" | "w" => ReplCommand::Save,
        "save-as" | "saveas" => ReplCommand::SaveAs(required(verb, arg)?.to_string()),
        "new" => ReplCommand::New,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => {
            return Err(ScribeError::InvalidOperation(format!(
                "unknown command '{}' (try 'help')",
                other
            )))
        }
    };
    Ok(Some(command))
}

pub async fn execute<G: StorageGateway + 'static>(
    session: &SessionCoordinator<G>,
    config: &ScribeConfig,
    command: ReplCommand,
) -> Result<CmdResult> {
    let result = CmdResult::default();
    match command {
        ReplCommand::Open(handle) => {
            let view = session.load(&handle).await?;
            Ok(result.with_message(CmdMessage::info(format!(
                "Opened {} ({} chars)",
                view.title(),
                view.buffer.len_chars()
            ))))
        }
        ReplCommand::Append(text) => {
            session.current().buffer.append(&text);
            Ok(result)
        }
        ReplCommand::Set(text) => {
            session.current().buffer.replace_all(text);
            Ok(result)
        }
        ReplCommand::Show => Ok(result.with_output(session.current().buffer.text())),
        ReplCommand::Status => {
            let view = session.current();
            let state = if session.is_modified(&view.buffer) {
                "modified"
            } else {
                "saved"
            };
            let location = view
                .handle
                .as_ref()
                .map(|h| h.to_string())
                .unwrap_or_else(|| "no file yet".to_string());
            Ok(result.with_message(CmdMessage::info(format!(
                "{} [{}] ({})",
                view.title(),
                state,
                location
            ))))
        }
        ReplCommand::Save => {
            let view = session.current();
            let outcome = session.save().await?;
            Ok(result.with_message(CmdMessage::saved(outcome, view.title())))
        }
        ReplCommand::SaveAs(name) => {
            let target = Handle::new(config.with_default_ext(&name));
            let buffer = session.current().buffer;
            let bound = session.save_as(&buffer, &target).await?;
            let mut result = result.with_message(CmdMessage::success(format!("Saved as {}", target)));
            if bound != buffer && session.current().buffer != bound {
                result.add_message(CmdMessage::info(
                    "The session moved on before the save finished; it was not switched over",
                ));
            }
            Ok(result)
        }
        ReplCommand::New => {
            session.new_document().await;
            Ok(result.with_message(CmdMessage::info("New document")))
        }
        ReplCommand::Help => Ok(result.with_output(HELP)),
        ReplCommand::Quit => {
            let mut result = result;
            let view = session.current();
            if session.is_modified(&view.buffer) {
                result.add_message(CmdMessage::warning(format!(
                    "{} has unsaved changes",
                    view.title()
                )));
            }
            result.quit = true;
            Ok(result)
        }
    }
}
