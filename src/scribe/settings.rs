use crate::error::{Result, ScribeError};
use crate::model::Handle;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsData {
    #[serde(default)]
    pub last_file: Option<Handle>,
}

/// Small key/value state that survives restarts (currently only the last
/// opened file).
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: Mutex<SettingsData>,
    persist: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    /// Settings that are never written anywhere.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(SettingsData::default()),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// Loads `settings.json` from `dir`; a missing file means defaults.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(SETTINGS_FILENAME);
        let data = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(ScribeError::Serialization)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsData::default(),
            Err(e) => return Err(ScribeError::Io(e)),
        };
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
            persist: tokio::sync::Mutex::new(()),
        })
    }

    pub fn last_file(&self) -> Option<Handle> {
        self.data.lock().last_file.clone()
    }

    pub async fn store_last_file(&self, handle: Option<Handle>) -> Result<()> {
        let _guard = self.persist.lock().await;
        let snapshot = {
            let mut data = self.data.lock();
            if data.last_file == handle {
                return Ok(());
            }
            data.last_file = handle;
            data.clone()
        };

        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&snapshot).map_err(ScribeError::Serialization)?;
        write_atomic(path, content).await
    }
}

async fn write_atomic(path: &Path, content: String) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).await.map_err(ScribeError::Io)?;

    let tmp = dir.join(format!(".settings-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, content).await.map_err(ScribeError::Io)?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ScribeError::Io(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn last_file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let settings = SettingsStore::open(dir.path()).await.unwrap();
        assert_eq!(settings.last_file(), None);

        settings
            .store_last_file(Some(Handle::new("notes.txt")))
            .await
            .unwrap();

        let reopened = SettingsStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.last_file(), Some(Handle::new("notes.txt")));
    }

    #[tokio::test]
    async fn clearing_last_file() {
        let dir = TempDir::new().unwrap();
        let settings = SettingsStore::open(dir.path()).await.unwrap();
        settings
            .store_last_file(Some(Handle::new("a")))
            .await
            .unwrap();
        settings.store_last_file(None).await.unwrap();

        let reopened = SettingsStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.last_file(), None);
    }

    #[tokio::test]
    async fn in_memory_store_writes_nothing() {
        let settings = SettingsStore::in_memory();
        settings
            .store_last_file(Some(Handle::new("x")))
            .await
            .unwrap();
        assert_eq!(settings.last_file(), Some(Handle::new("x")));
    }
}
