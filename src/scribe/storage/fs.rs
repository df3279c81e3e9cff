use super::StorageGateway;
use crate::error::{Result, ScribeError};
use crate::model::Handle;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub struct FsGateway {
    root: PathBuf,
}

impl FsGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a handle to a path: absolute handles are used as-is, relative
    /// ones live under the gateway root.
    pub fn resolve(&self, handle: &Handle) -> PathBuf {
        let raw = Path::new(handle.as_str());
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        }
    }

    async fn ensure_parent(&self, handle: &Handle, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await.unwrap_or(false) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ScribeError::from_io(handle, e))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for FsGateway {
    async fn read(&self, handle: &Handle) -> Result<String> {
        let path = self.resolve(handle);
        fs::read_to_string(&path)
            .await
            .map_err(|e| ScribeError::from_io(handle, e))
    }

    async fn write(&self, handle: &Handle, content: &str) -> Result<()> {
        let target = self.resolve(handle);
        self.ensure_parent(handle, &target).await?;

        // Atomic write
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let tmp = dir.join(format!(".scribe-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content)
            .await
            .map_err(|e| ScribeError::from_io(handle, e))?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(ScribeError::from_io(handle, e));
        }

        tracing::debug!(path = %target.display(), bytes = content.len(), "wrote file");
        Ok(())
    }

    async fn display_name(&self, handle: &Handle) -> Result<String> {
        self.resolve(handle)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ScribeError::NotFound(handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsGateway) {
        let dir = TempDir::new().unwrap();
        let gateway = FsGateway::new(dir.path());
        (dir, gateway)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, gateway) = setup();
        let handle = Handle::new("notes.txt");
        for content in ["", "hello", "multi\nline\r\n", "ünïcödé ✓"] {
            gateway.write(&handle, content).await.unwrap();
            assert_eq!(gateway.read(&handle).await.unwrap(), content);
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_dir, gateway) = setup();
        let err = gateway.read(&Handle::new("nope.txt")).await.unwrap_err();
        assert!(matches!(err, ScribeError::NotFound(h) if h.as_str() == "nope.txt"));
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let (dir, gateway) = setup();
        gateway
            .write(&Handle::new("a/b/c.md"), "deep")
            .await
            .unwrap();
        assert!(dir.path().join("a/b/c.md").exists());
    }

    #[tokio::test]
    async fn display_name_is_file_name() {
        let (_dir, gateway) = setup();
        let name = gateway
            .display_name(&Handle::new("docs/readme.md"))
            .await
            .unwrap();
        assert_eq!(name, "readme.md");
    }
}
