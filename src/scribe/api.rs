//! # API Facade
//!
//! Single entry point for every scribe operation, whatever the UI.
//!
//! The facade:
//! - **Dispatches** to the command functions in `commands/`
//! - **Normalizes inputs** (sheet ids, bare file names)
//! - **Returns structured types** (`Result<CmdResult>`), never prints
//!
//! ## Generic Over Backends
//!
//! `ScribeApi<G, R>` is generic over the storage gateway and the record store:
//! - Production: `ScribeApi<FsGateway, JsonRecordStore>` (see [`ScribeApi::open`])
//! - Testing: `ScribeApi<MemGateway, MemRecordStore>`
//!
//! File sessions and sheets share one gateway, so a sheet saved to a file and
//! a session on that file see the same storage.

use crate::commands::{self, config::ConfigAction, repl::ReplCommand, CmdResult};
use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::model::{Handle, RecordId};
use crate::records::json::JsonRecordStore;
use crate::records::RecordStore;
use crate::session::{SessionCoordinator, SessionOptions};
use crate::settings::SettingsStore;
use crate::sheets::SheetService;
use crate::storage::fs::FsGateway;
use crate::storage::StorageGateway;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ScribeApi<G, R> {
    session: SessionCoordinator<G>,
    sheets: SheetService<G, R>,
    config: ScribeConfig,
    data_dir: Option<PathBuf>,
}

impl ScribeApi<FsGateway, JsonRecordStore> {
    /// Production wiring: files under `root`, config, settings and records
    /// under `data_dir`.
    pub async fn open(root: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let config = ScribeConfig::load(&data_dir)?;
        let settings = Arc::new(SettingsStore::open(&data_dir).await?);
        let records = Arc::new(JsonRecordStore::open(&data_dir).await?);
        let gateway = Arc::new(FsGateway::new(root));

        let options = SessionOptions::from_config(&config).with_settings(settings);
        tracing::debug!(data_dir = %data_dir.display(), "api opened");
        Ok(Self::new(gateway, records, config, options).with_data_dir(data_dir))
    }
}

impl<G, R> ScribeApi<G, R>
where
    G: StorageGateway + 'static,
    R: RecordStore + 'static,
{
    pub fn new(gateway: Arc<G>, records: Arc<R>, config: ScribeConfig, options: SessionOptions) -> Self {
        Self {
            session: SessionCoordinator::with_options(gateway.clone(), options),
            sheets: SheetService::new(gateway, records),
            config,
            data_dir: None,
        }
    }

    /// Directory `config` reads and writes `config.json` in.
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    pub fn session(&self) -> &SessionCoordinator<G> {
        &self.session
    }

    pub fn sheets(&self) -> &SheetService<G, R> {
        &self.sheets
    }

    pub fn config(&self) -> &ScribeConfig {
        &self.config
    }

    pub async fn cat(&self, handle: &str) -> Result<CmdResult> {
        commands::document::cat(&self.session, &parse_handle(handle)?).await
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<CmdResult> {
        let to = self.config.with_default_ext(to);
        commands::document::copy(&self.session, &parse_handle(from)?, &parse_handle(&to)?).await
    }

    pub async fn sheet_list(&self) -> Result<CmdResult> {
        commands::sheet::list(&self.sheets).await
    }

    pub async fn sheet_show(&self, id: &str) -> Result<CmdResult> {
        commands::sheet::show(&self.sheets, parse_record_id(id)?).await
    }

    pub async fn sheet_write(&self, id: &str, text: &str, append: bool) -> Result<CmdResult> {
        commands::sheet::write(&self.sheets, parse_record_id(id)?, text, append).await
    }

    pub async fn sheet_save_as(&self, id: &str, handle: &str) -> Result<CmdResult> {
        let handle = self.config.with_default_ext(handle);
        commands::sheet::save_as(&self.sheets, parse_record_id(id)?, &parse_handle(&handle)?).await
    }

    pub async fn sheet_attach(&self, id: &str, handle: &str) -> Result<CmdResult> {
        commands::sheet::attach(&self.sheets, parse_record_id(id)?, &parse_handle(handle)?).await
    }

    pub fn configure(&self, action: ConfigAction) -> Result<CmdResult> {
        let dir = self
            .data_dir
            .as_ref()
            .ok_or_else(|| ScribeError::Config("no data directory configured".to_string()))?;
        commands::config::run(dir, action)
    }

    /// Reopens the last file of a previous session, if it is still readable.
    pub async fn resume(&self) -> Result<CmdResult> {
        let view = self.session.restore_last().await?;
        let mut result = CmdResult::default();
        if let Some(handle) = &view.handle {
            result.add_message(commands::CmdMessage::info(format!("Reopened {}", handle)));
        }
        Ok(result)
    }

    /// Runs one line of the interactive session.
    pub async fn session_line(&self, line: &str) -> Result<CmdResult> {
        match commands::repl::parse(line)? {
            Some(command) => self.session_command(command).await,
            None => Ok(CmdResult::default()),
        }
    }

    pub async fn session_command(&self, command: ReplCommand) -> Result<CmdResult> {
        commands::repl::execute(&self.session, &self.config, command).await
    }
}

fn parse_handle(raw: &str) -> Result<Handle> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScribeError::InvalidOperation("file name cannot be empty".into()));
    }
    Ok(Handle::new(raw))
}

/// Accepts `3` or `#3`.
fn parse_record_id(raw: &str) -> Result<RecordId> {
    let digits = raw.trim().trim_start_matches('#');
    digits
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(RecordId)
        .ok_or_else(|| ScribeError::InvalidOperation(format!("invalid sheet id: {}", raw)))
}
