//! Credential loading from an optional `.env` file and the process
//! environment.
//!
//! Notification sinks look up their secrets (bot token, webhook URL) here by
//! the names configured in `watchdog.toml`. Process environment variables
//! win over the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Runtime credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a non-empty credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Overlay `key` from the process environment, if set.
    fn overlay_env(&mut self, key: &str) {
        if let Ok(value) = std::env::var(key) {
            self.vars.insert(key.to_owned(), value);
        }
    }
}

/// Load credentials from `path` (if it exists) and overlay the process
/// environment for each name in `keys`.
///
/// # Errors
///
/// Returns an error if an existing file has permissions that are too broad
/// or cannot be parsed.
pub fn load_credentials(path: &Path, keys: &[&str]) -> anyhow::Result<Credentials> {
    let mut credentials = if path.exists() {
        validate_private_permissions(path)?;
        read_env_file(path)?
    } else {
        debug!(path = %path.display(), "no credentials file, using process environment only");
        Credentials::default()
    };

    for key in keys {
        credentials.overlay_env(key);
    }

    Ok(credentials)
}

fn read_env_file(path: &Path) -> anyhow::Result<Credentials> {
    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials::from_map(vars))
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
