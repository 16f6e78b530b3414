use crate::error::{ClientError, Result};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

pub const DATABASE_FILE: &str = "mathmentor.sqlite";

// Client-side key/value settings (theme, css version, cached user record)
const MIGRATIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL -- Unix Timestamp (seconds)
);
";

/// Persistent string store standing in for the browser's local storage.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads a JSON value stored under `key`. Unparseable values read as absent.
pub async fn get_json<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Ignoring malformed value under '{}': {}", key, e);
            Ok(None)
        }
    }
}

pub async fn set_json<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| ClientError::Storage(e.to_string()))?;
    store.set(key, &raw).await
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// SQLite-backed [`LocalStore`] under the client's data directory.
#[derive(Debug)]
pub struct StorageManager {
    pool: SqlitePool,
}

impl StorageManager {
    /// Opens (creating if needed) the settings database in `data_dir` and
    /// runs migrations.
    pub async fn open(data_dir: &Path) -> Result<Self, anyhow::Error> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .context("Failed to create data directory")?;
        let db_path = data_dir.join(DATABASE_FILE);

        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        log::info!("Connecting to database: {}", db_url);

        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            log::info!("Database file not found, creating...");
            Sqlite::create_database(&db_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database migrations completed.");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LocalStore for StorageManager {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        log::debug!("Reading setting {}", key);
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(ClientError::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        log::debug!("Writing setting {}", key);
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            log::debug!("Removed setting {}", key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use tempfile::tempdir;

    #[tokio::test]
    async fn settings_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = StorageManager::open(dir.path()).await.unwrap();
            store.set("theme", "dark").await.unwrap();
            store.set("theme", "light").await.unwrap();
            store.set("cssVersion", "1.0").await.unwrap();
            store.remove("cssVersion").await.unwrap();
            store.pool().close().await;
        }

        let store = StorageManager::open(dir.path()).await.unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("light"));
        assert_eq!(store.get("cssVersion").await.unwrap(), None);
        assert!(dir.path().join(DATABASE_FILE).exists());
    }

    #[tokio::test]
    async fn json_helpers_ignore_malformed_values() {
        let store = MemoryStore::new();
        let user = UserRecord {
            email: "a@b.co".into(),
            username: "ann".into(),
            ..Default::default()
        };
        set_json(&store, "user", &user).await.unwrap();
        assert_eq!(get_json::<UserRecord>(&store, "user").await.unwrap(), Some(user));

        store.set("user", "{not json").await.unwrap();
        assert_eq!(get_json::<UserRecord>(&store, "user").await.unwrap(), None);
        assert_eq!(get_json::<UserRecord>(&store, "missing").await.unwrap(), None);
    }
}
