//! SQLite-backed durable key-value storage (the persisted session lives here).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use curia_auth::{KeyValueStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Durable string storage in a single SQLite table.
///
/// The pool is created lazily on first use, so constructing a storage never
/// touches the disk.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    location: Location,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteStorage {
    /// Storage backed by the database file at `path` (created if missing).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::at(Location::File(path.into()))
    }

    /// Private in-memory database; lives as long as this storage (and its clones).
    pub fn in_memory() -> Self {
        Self::at(Location::Memory)
    }

    fn at(location: Location) -> Self {
        Self {
            location,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    async fn connect(&self) -> anyhow::Result<SqlitePool> {
        let pool = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create storage directory at {:?}", parent))?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);
                SqlitePoolOptions::new()
                    .connect_with(options)
                    .await
                    .with_context(|| format!("failed to open SQLite storage at {:?}", path))?
            }
            Location::Memory => {
                // One connection that never recycles, or the database vanishes.
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .context("invalid in-memory SQLite url")?;
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .context("failed to open in-memory SQLite storage")?
            }
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv_store table")?;

        Ok(pool)
    }

    /// Get the pool, initializing it if necessary.
    async fn pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let pool = self.connect().await.map_err(|err| {
            tracing::error!(error = ?err, "storage initialization failed");
            StorageError::Unavailable(format!("{err:#}"))
        })?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .with_context(|| format!("failed to read `{key}`"))?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .with_context(|| format!("malformed row for `{key}`"))
    }

    async fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .with_context(|| format!("failed to write `{key}`"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .with_context(|| format!("failed to remove `{key}`"))?;
        Ok(())
    }
}

/// Keep `Unavailable` from pool setup; everything else is a backend failure.
fn backend(err: anyhow::Error) -> StorageError {
    match err.downcast::<StorageError>() {
        Ok(storage) => storage,
        Err(other) => StorageError::Backend(format!("{other:#}")),
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.read(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(key, value).await.map_err(backend)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key).await.map_err(backend)
    }
}
