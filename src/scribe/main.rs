use chrono::Utc;
use clap::Parser;
use colored::*;
use scribe::api::ScribeApi;
use scribe::commands::config::ConfigAction;
use scribe::commands::repl::{self, ReplCommand};
use scribe::commands::{CmdMessage, CmdResult, MessageLevel};
use scribe::error::Result;
use scribe::logging::{self, LogConfig};
use scribe::records::json::JsonRecordStore;
use scribe::storage::fs::FsGateway;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use unicode_width::UnicodeWidthStr;

mod args;
use args::{Cli, Commands, SheetAction};

type Api = ScribeApi<FsGateway, JsonRecordStore>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = logging::init(LogConfig {
        verbose: cli.verbose,
        plain: std::env::var_os("NO_COLOR").is_some(),
    }) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    let api = init_api(&cli).await?;

    match cli.command {
        Commands::Session {
            file,
            fresh,
            no_autosave,
        } => handle_session(&api, file, fresh, no_autosave).await,
        Commands::Cat { file } => print_result(api.cat(&file).await?),
        Commands::Copy { from, to } => print_result(api.copy(&from, &to).await?),
        Commands::Config { key, value } => {
            let action = match (key, value) {
                (None, _) => ConfigAction::ShowAll,
                (Some(key), None) => ConfigAction::ShowKey(key),
                (Some(key), Some(value)) => ConfigAction::Set(key, value),
            };
            print_result(api.configure(action)?)
        }
        Commands::Sheet { action } => handle_sheet(&api, action).await,
    }
}

async fn init_api(cli: &Cli) -> Result<Api> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => scribe::config::data_dir()?,
    };
    ScribeApi::open(root, data_dir).await
}

async fn handle_sheet(api: &Api, action: SheetAction) -> Result<()> {
    let result = match action {
        SheetAction::List => api.sheet_list().await?,
        SheetAction::Show { id } => api.sheet_show(&id).await?,
        SheetAction::Write { id, text, append } => api.sheet_write(&id, &text, append).await?,
        SheetAction::SaveAs { id, file } => api.sheet_save_as(&id, &file).await?,
        SheetAction::Attach { id, file } => api.sheet_attach(&id, &file).await?,
    };
    print_result(result)
}

async fn handle_session(
    api: &Api,
    file: Option<String>,
    fresh: bool,
    no_autosave: bool,
) -> Result<()> {
    if let Some(file) = file {
        print_result(api.session_command(ReplCommand::Open(file.into())).await?)?;
    } else if !fresh {
        print_result(api.resume().await?)?;
    }

    let autosave = api.config().autosave && !no_autosave;
    let autosaver = autosave.then(|| api.session().spawn_autosave());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(api);
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match repl::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                print_messages(&[CmdMessage::error(e.to_string())]);
                continue;
            }
        };

        let quitting = command == ReplCommand::Quit;
        let showing_status = command == ReplCommand::Status;
        if quitting && autosave {
            flush_autosave(api).await;
        }

        match api.session_command(command).await {
            Ok(result) => {
                let quit = result.quit;
                print_result(result)?;
                if showing_status {
                    print_saved_at(api);
                }
                if quit {
                    break;
                }
            }
            Err(e) => print_messages(&[CmdMessage::error(e.to_string())]),
        }
    }

    if let Some(autosaver) = autosaver {
        autosaver.abort();
    }
    Ok(())
}

/// Saves a bound, modified document right away instead of waiting out the
/// autosave delay.
async fn flush_autosave(api: &Api) {
    let view = api.session().current();
    if !view.is_bound() || !api.session().is_modified(&view.buffer) {
        return;
    }
    match api.session().save().await {
        Ok(outcome) => print_messages(&[CmdMessage::saved(outcome, view.title())]),
        Err(e) => print_messages(&[CmdMessage::error(e.to_string())]),
    }
}

const PROMPT_TITLE_WIDTH: usize = 30;
const TIME_WIDTH: usize = 14;

fn print_prompt(api: &Api) {
    let view = api.session().current();
    let title = truncate_to_width(view.title(), PROMPT_TITLE_WIDTH);
    let marker = if api.session().is_modified(&view.buffer) {
        "*".yellow()
    } else {
        "".normal()
    };
    print!("{}{}> ", title.bold(), marker);
    let _ = std::io::stdout().flush();
}

fn print_saved_at(api: &Api) {
    if let Some(saved_at) = api.session().current().saved_at {
        println!("{}", format!("last saved {}", format_time_ago(saved_at).trim_start()).dimmed());
    }
}

fn print_result(result: CmdResult) -> Result<()> {
    if let Some(output) = &result.output {
        if output.ends_with('\n') {
            print!("{}", output);
        } else {
            println!("{}", output);
        }
    }
    print_messages(&result.messages);
    Ok(())
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: chrono::DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(timestamp);

    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());

    format!("{:>width$}", time_str, width = TIME_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_titles() {
        assert_eq!(truncate_to_width("notes.txt", 30), "notes.txt");
    }

    #[test]
    fn truncate_marks_cut() {
        let cut = truncate_to_width("a-very-long-file-name.txt", 10);
        assert!(cut.ends_with('…'));
        assert!(cut.width() <= 10);
    }

    #[test]
    fn time_ago_is_right_aligned() {
        let formatted = format_time_ago(Utc::now());
        assert_eq!(formatted.chars().count(), TIME_WIDTH);
    }
}
