//! SQLite-backed settings store.
//!
//! One row per identifier; the raw fields are kept as a JSON object in the
//! `document` column. The schema is applied inline on open.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use super::SettingsStore;
use crate::context::RawSettings;
use crate::error::SettingsError;

/// Settings table in a local SQLite database.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) the settings database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// cannot be opened, or the migration fails.
    pub async fn open(path: &Path) -> Result<Self, SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF");

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let migration_sql = include_str!("../../migrations/001_settings_schema.sql");
        sqlx::raw_sql(migration_sql).execute(&pool).await?;

        debug!(path = %path.display(), "settings database ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn fetch(&self, id: &str) -> Result<Option<RawSettings>, SettingsError> {
        let document = sqlx::query_scalar::<_, String>(
            "SELECT document FROM watchdog_settings WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        document
            .map(|doc| {
                serde_json::from_str::<RawSettings>(&doc)
                    .map_err(|e| SettingsError::Malformed(format!("settings `{id}`: {e}")))
            })
            .transpose()
    }

    async fn put(&self, id: &str, settings: &RawSettings) -> Result<(), SettingsError> {
        let document = serde_json::to_string(settings)
            .map_err(|e| SettingsError::Malformed(e.to_string()))?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"INSERT INTO watchdog_settings (id, document, updated_at)
              VALUES (?1, ?2, ?3)
              ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(&document)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %id, "settings stored");
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<String>, SettingsError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM watchdog_settings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
