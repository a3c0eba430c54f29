//! Preference storage in a SQLite table.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS preferences (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

fn storage_error(action: &str) -> impl FnOnce(sqlx::Error) -> BridgeError + '_ {
    move |e| BridgeError::StorageError(format!("Failed to {}: {}", action, e))
}

/// SQLite-backed [`SettingsStore`].
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) the preferences database at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(storage_error("open preferences"))?;

        Self::migrate(&pool).await?;
        debug!(path = ?db_path, "Opened preferences store");
        Ok(Self { pool })
    }

    /// Throwaway store for tests.
    pub async fn in_memory() -> Result<Self> {
        // Every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_error("open preferences"))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(storage_error("create preferences table"))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("store preference"))?;

        debug!(key, "Stored preference");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("read preference"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete preference"))?
            .rows_affected();

        debug!(key, removed, "Deleted preference");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_selection_roundtrip_and_delete() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store
            .set_string("selectedNarrator", r#"{"id":7}"#)
            .await
            .unwrap();
        assert_eq!(
            store.get_string("selectedNarrator").await.unwrap().as_deref(),
            Some(r#"{"id":7}"#)
        );
        assert!(store.has_key("selectedNarrator").await.unwrap());

        store.delete("selectedNarrator").await.unwrap();
        assert_eq!(store.get_string("selectedNarrator").await.unwrap(), None);
        store.delete("selectedNarrator").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("selectedNarrator", r#"{"id":1}"#).await.unwrap();
        store.set_string("selectedNarrator", r#"{"id":7}"#).await.unwrap();

        assert_eq!(
            store.get_string("selectedNarrator").await.unwrap().as_deref(),
            Some(r#"{"id":7}"#)
        );
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let path = std::env::temp_dir()
            .join(format!("tilawa-settings-{}", std::process::id()))
            .join("settings.db");

        {
            let store = SqliteSettingsStore::new(path.clone()).await.unwrap();
            store.set_string("selectedNarrator", r#"{"id":3}"#).await.unwrap();
        }

        let reopened = SqliteSettingsStore::new(path.clone()).await.unwrap();
        assert_eq!(
            reopened.get_string("selectedNarrator").await.unwrap().as_deref(),
            Some(r#"{"id":3}"#)
        );

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
