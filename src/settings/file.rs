//! File-backed settings store.
//!
//! The file maps identifiers to raw field tables, in TOML or (for a `.json`
//! extension) JSON:
//!
//! ```toml
//! [web-frontend]
//! ListOfServices = ["nginx", "php-fpm"]
//! NumOfSecCheck = 60
//! NumOfSecWait = 10
//! NumOfAttempts = 4
//! ```
//!
//! The file is re-read on every fetch so edits are picked up on reload.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{DocumentFormat, SettingsStore};
use crate::context::RawSettings;
use crate::error::SettingsError;

type Documents = BTreeMap<String, RawSettings>;

/// Settings documents stored in a single local file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Store backed by the file at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::for_path(&self.path)
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn load(&self) -> Result<Documents, SettingsError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Documents::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        self.format().parse(&contents)
    }

    async fn save(&self, documents: &Documents) -> Result<(), SettingsError> {
        let rendered = self.format().render(documents)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, rendered.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn fetch(&self, id: &str) -> Result<Option<RawSettings>, SettingsError> {
        let mut documents = self.load().await?;
        Ok(documents.remove(id))
    }

    async fn put(&self, id: &str, settings: &RawSettings) -> Result<(), SettingsError> {
        let mut documents = self.load().await?;
        documents.insert(id.to_owned(), settings.clone());
        self.save(&documents).await
    }

    async fn ids(&self) -> Result<Vec<String>, SettingsError> {
        Ok(self.load().await?.into_keys().collect())
    }
}
