//! [`FileSystemAccess`] over `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR: &str = "tilawa";

/// Local filesystem rooted at the platform data directory
/// (`~/.local/share/tilawa` on Linux).
pub struct TokioFileSystem {
    data_dir: PathBuf,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(std::env::temp_dir);
        Self::with_data_directory(base.join(APP_DIR))
    }

    pub fn with_data_directory(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_data_directory(&self) -> Result<PathBuf> {
        self.create_dir_all(&self.data_dir).await?;
        Ok(self.data_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(BridgeError::Io)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        if fs::try_exists(path).await.map_err(BridgeError::Io)? {
            return Ok(());
        }
        fs::create_dir_all(path).await.map_err(BridgeError::Io)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }
}
