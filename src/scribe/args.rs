use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(about = "Edit text documents with deduplicated, debounced saves", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory relative file names resolve against (defaults to the current directory)
    #[arg(long, global = true, env = "SCRIBE_ROOT")]
    pub root: Option<PathBuf>,

    /// Directory holding config, settings and sheet records
    #[arg(long, global = true, env = "SCRIBE_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive editing session (type `help` inside for commands)
    #[command(alias = "s")]
    Session {
        /// File to open first (defaults to the last opened file)
        file: Option<String>,

        /// Start with an empty document instead of the last opened file
        #[arg(long)]
        fresh: bool,

        /// Disable autosave for this session
        #[arg(long)]
        no_autosave: bool,
    },

    /// Print a file
    Cat {
        file: String,
    },

    /// Copy a file through a session (save-as)
    #[command(alias = "cp")]
    Copy {
        from: String,
        to: String,
    },

    /// Get or set configuration
    Config {
        /// Configuration key (file-ext, autosave, autosave-delay)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },

    /// Work with sheets (record-backed documents)
    Sheet {
        #[command(subcommand)]
        action: SheetAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SheetAction {
    /// List all sheets
    #[command(alias = "ls")]
    List,

    /// Print a sheet (creates an empty one if the id is new)
    Show { id: String },

    /// Replace a sheet's text and save it
    Write {
        id: String,

        /// New text
        text: String,

        /// Append instead of replacing
        #[arg(short, long)]
        append: bool,
    },

    /// Save a sheet to a file; the sheet follows the file from then on
    SaveAs { id: String, file: String },

    /// Load a file's content into a sheet and attach the sheet to it
    Attach { id: String, file: String },
}
