//! Storage and File System Abstractions
//!
//! File-system access for the local audio directory and the key-value store
//! holding user preferences such as the selected narrator.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Access to the host's app-owned storage.
///
/// Desktop hosts map this onto the real filesystem; mobile hosts onto the
/// app sandbox. Writing audio files is the job of [`FileTransfer`], so only
/// the operations the download bookkeeping needs are exposed here.
///
/// [`FileTransfer`]: crate::transfer::FileTransfer
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn audio_dir(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let dir = fs.get_data_directory().await?.join("quran_audio");
///     fs.create_dir_all(&dir).await?;
///     Ok(dir)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Persistent per-app directory. Downloaded audio lives below it.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Whether `path` names an existing file or directory.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// String key-value store for user preferences.
///
/// Callers that need structured values serialize them; the selected
/// narrator is stored as JSON.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("selectedNarrator", json).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Insert or replace the value under `key`.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}
