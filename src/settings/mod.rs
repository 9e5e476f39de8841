//! Settings stores holding raw watchdog configuration by identifier.
//!
//! Two backends are provided: [`sqlite::SqliteSettingsStore`] and
//! [`file::FileSettingsStore`]. Both hand back [`RawSettings`]; validation
//! happens later in [`crate::context::WatchdogContext::from_raw`].

pub mod file;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{RawSettings, WatchdogContext};
use crate::error::SettingsError;
use crate::service::ServiceControl;

/// Key-value lookup of raw settings documents.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the document stored under `id`, or `None` if there is none.
    async fn fetch(&self, id: &str) -> Result<Option<RawSettings>, SettingsError>;

    /// Store (or replace) the document under `id`.
    async fn put(&self, id: &str, settings: &RawSettings) -> Result<(), SettingsError>;

    /// Identifiers that currently have a document, sorted.
    async fn ids(&self) -> Result<Vec<String>, SettingsError>;
}

/// Serialization used for a settings document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    /// JSON for a `.json` extension, TOML otherwise.
    pub(crate) fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    pub(crate) fn parse<T: serde::de::DeserializeOwned>(
        self,
        contents: &str,
    ) -> Result<T, SettingsError> {
        match self {
            Self::Toml => toml::from_str(contents).map_err(malformed),
            Self::Json => serde_json::from_str(contents).map_err(malformed),
        }
    }

    pub(crate) fn render<T: serde::Serialize>(self, value: &T) -> Result<String, SettingsError> {
        match self {
            Self::Toml => toml::to_string(value).map_err(malformed),
            Self::Json => serde_json::to_string_pretty(value).map_err(malformed),
        }
    }
}

fn malformed(e: impl std::fmt::Display) -> SettingsError {
    SettingsError::Malformed(e.to_string())
}

/// Read a single settings document (the four raw fields at top level) from
/// a TOML or `.json` file.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] if the file cannot be read and
/// [`SettingsError::Malformed`] if it does not parse.
pub fn read_document(path: &Path) -> Result<RawSettings, SettingsError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    DocumentFormat::for_path(path).parse(&contents)
}

/// Validate `settings` and store them under `id` only if they would build a
/// [`WatchdogContext`].
///
/// # Errors
///
/// Returns [`SettingsError::Invalid`] without touching the store if
/// validation fails, or the store's own error if the write fails.
pub async fn put_validated(
    store: &dyn SettingsStore,
    id: &str,
    settings: &RawSettings,
    control: Arc<dyn ServiceControl>,
) -> Result<WatchdogContext, SettingsError> {
    let context = WatchdogContext::from_raw(settings, control)?;
    store.put(id, settings).await?;
    Ok(context)
}
