use crate::commands::{CmdMessage, CmdResult};
use crate::config::ScribeConfig;
use crate::error::Result;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    ShowAll,
    ShowKey(String),
    Set(String, String),
}

/// Reads or updates `config.json` in `dir`. Changes apply from the next run.
pub fn run(dir: &Path, action: ConfigAction) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    match action {
        ConfigAction::ShowAll => {
            let config = ScribeConfig::load(dir)?;
            for (key, value) in config.entries() {
                result.add_message(CmdMessage::info(format!("{} = {}", key, value)));
            }
        }
        ConfigAction::ShowKey(key) => {
            let config = ScribeConfig::load(dir)?;
            match config.get(&key) {
                Some(value) => result.add_message(CmdMessage::info(value)),
                None => result.add_message(CmdMessage::error(format!("Unknown config key: {}", key))),
            }
        }
        ConfigAction::Set(key, value) => {
            let mut config = ScribeConfig::load(dir)?;
            if let Err(e) = config.set(&key, &value) {
                result.add_message(CmdMessage::error(e));
                return Ok(result);
            }
            config.save(dir)?;
            let shown = config.get(&key).unwrap_or(value);
            result.add_message(CmdMessage::success(format!("{} set to {}", key, shown)));
        }
    }
    Ok(result)
}
