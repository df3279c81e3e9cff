use crate::error::{Result, ScribeError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_FILE_EXT: &str = ".txt";
const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 500;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "SCRIBE_HOME";

/// Configuration for scribe, stored in `<data dir>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScribeConfig {
    /// Quiet period after the last edit before an autosave fires
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// Whether interactive sessions autosave at all
    #[serde(default = "default_autosave")]
    pub autosave: bool,

    /// File extension appended to bare names given to save-as
    #[serde(default = "default_file_ext")]
    pub file_ext: String,
}

fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY_MS
}

fn default_autosave() -> bool {
    true
}

fn default_file_ext() -> String {
    DEFAULT_FILE_EXT.to_string()
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            autosave: true,
            file_ext: DEFAULT_FILE_EXT.to_string(),
        }
    }
}

impl ScribeConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(ScribeError::Io)?;
        let config: ScribeConfig =
            serde_json::from_str(&content).map_err(ScribeError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(ScribeError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(ScribeError::Serialization)?;
        fs::write(config_path, content).map_err(ScribeError::Io)?;
        Ok(())
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Set the file extension (normalizes to start with a dot)
    pub fn set_file_ext(&mut self, ext: &str) {
        if ext.starts_with('.') {
            self.file_ext = ext.to_string();
        } else {
            self.file_ext = format!(".{}", ext);
        }
    }

    /// Reads a setting by its CLI key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "file-ext" => Some(self.file_ext.clone()),
            "autosave" => Some(self.autosave.to_string()),
            "autosave-delay" => Some(format!("{}ms", self.autosave_delay_ms)),
            _ => None,
        }
    }

    /// Sets a setting by its CLI key, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "file-ext" => {
                if value.trim().trim_start_matches('.').is_empty() {
                    return Err("file-ext cannot be empty".to_string());
                }
                self.set_file_ext(value.trim());
            }
            "autosave" => {
                self.autosave = match value {
                    "on" | "true" | "yes" => true,
                    "off" | "false" | "no" => false,
                    _ => return Err(format!("autosave must be on or off, got '{}'", value)),
                };
            }
            "autosave-delay" => {
                let millis = value.trim_end_matches("ms");
                self.autosave_delay_ms = millis
                    .parse()
                    .map_err(|_| format!("autosave-delay must be milliseconds, got '{}'", value))?;
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    /// All settings as `(key, value)` pairs, in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        ["file-ext", "autosave", "autosave-delay"]
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Appends the configured extension to names that have none.
    pub fn with_default_ext(&self, name: &str) -> String {
        if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{}{}", name, self.file_ext)
        }
    }
}

/// Where config, settings and records live: `SCRIBE_HOME` if set, otherwise
/// the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    ProjectDirs::from("", "", "scribe")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| ScribeError::Config("could not determine a data directory".to_string()))
}
