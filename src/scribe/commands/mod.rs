use crate::session::SaveOutcome;

pub mod config;
pub mod document;
pub mod repl;
pub mod sheet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }

    /// Message describing how a save went for `target`.
    pub fn saved(outcome: SaveOutcome, target: impl std::fmt::Display) -> Self {
        match outcome {
            SaveOutcome::Written => Self::success(format!("Saved {}", target)),
            SaveOutcome::NoOp => Self::info(format!("{} unchanged, nothing to save", target)),
        }
    }
}

/// What a command produced: text to print verbatim, plus status messages.
#[derive(Debug, Clone, Default)]
pub struct CmdResult {
    pub output: Option<String>,
    pub messages: Vec<CmdMessage>,
    /// Set by commands that end an interactive session.
    pub quit: bool,
}

impl CmdResult {
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_message(mut self, message: CmdMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }
}
