//! Daemon configuration loading and validation.
//!
//! Loads `watchdog.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal or empty config file is valid. The
//! services to watch are NOT configured here; they come from the settings
//! store so they can change without a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchdogConfig {
    /// Engine timing.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where raw watchdog settings are stored.
    #[serde(default)]
    pub settings: SettingsConfig,

    /// How services are controlled.
    #[serde(default)]
    pub control: ControlConfig,

    /// Telegram notification targets.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP webhook notification target.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Log filter and destination.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine timing.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seconds one `watch()` run may start new cycles before settings are
    /// fetched again.
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,

    /// Seconds to wait before refetching when no usable settings exist yet.
    #[serde(default = "default_settings_retry_secs")]
    pub settings_retry_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reload_secs: default_reload_secs(),
            settings_retry_secs: default_settings_retry_secs(),
        }
    }
}

/// Settings store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    /// SQLite database with one JSON document per identifier.
    #[default]
    Sqlite,
    /// TOML or JSON file with one table per identifier.
    File,
}

/// Settings store location.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: SettingsBackend,

    /// Store path; defaults to `settings.db` / `settings.toml` under the
    /// watchdog root.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Service manager invocation options.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Wrap `systemctl start/stop` in `sudo -n`.
    #[serde(default)]
    pub use_sudo: bool,

    /// Use the per-user manager (`systemctl --user`).
    #[serde(default)]
    pub user_mode: bool,

    /// Seconds after which a hanging `systemctl` call is killed (0 = never).
    #[serde(default = "default_control_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            use_sudo: false,
            user_mode: false,
            timeout_secs: default_control_timeout_secs(),
        }
    }
}

/// Telegram notification targets.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Credential name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Chat IDs that receive notifications. Empty disables Telegram.
    #[serde(default)]
    pub notify_users: Vec<i64>,

    /// Label prepended to every message.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: default_bot_token_env(),
            notify_users: Vec::new(),
            prefix: default_prefix(),
        }
    }
}

/// HTTP webhook target.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Credential name holding the webhook URL. Unset disables the webhook.
    #[serde(default = "default_webhook_url_env")]
    pub url_env: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url_env: default_webhook_url_env(),
        }
    }
}

/// Log filter and destination.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"watchdog=debug,sqlx=warn"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rotating JSON log files. Console only when unset;
    /// `--log` overrides it.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

/// Resolved filesystem paths under `~/.watchdog/`.
#[derive(Debug, Clone)]
pub struct WatchdogPaths {
    /// Root directory (`~/.watchdog/`).
    pub root: PathBuf,
    /// Default daemon configuration file.
    pub config_toml: PathBuf,
    /// Default credentials file.
    pub env_file: PathBuf,
    /// Default SQLite settings database.
    pub settings_db: PathBuf,
    /// Default file-backed settings document.
    pub settings_toml: PathBuf,
}

impl WatchdogConfig {
    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.engine.reload_secs >= 1, "engine.reload_secs must be >= 1");
        anyhow::ensure!(
            self.engine.settings_retry_secs >= 1,
            "engine.settings_retry_secs must be >= 1"
        );
        anyhow::ensure!(
            !self.telegram.bot_token_env.trim().is_empty(),
            "telegram.bot_token_env must not be empty"
        );
        anyhow::ensure!(
            !self.telegram.prefix.trim().is_empty(),
            "telegram.prefix must not be empty"
        );
        anyhow::ensure!(
            !self.webhook.url_env.trim().is_empty(),
            "webhook.url_env must not be empty"
        );
        anyhow::ensure!(
            !self.logging.level.trim().is_empty(),
            "logging.level must not be empty"
        );
        Ok(())
    }

    /// How long one `watch()` run lasts before settings are refetched.
    pub fn reload_budget(&self) -> Duration {
        Duration::from_secs(self.engine.reload_secs)
    }

    /// Wait between settings fetch retries.
    pub fn settings_retry(&self) -> Duration {
        Duration::from_secs(self.engine.settings_retry_secs)
    }

    /// Bound on a single `systemctl` call, if any.
    pub fn control_timeout(&self) -> Option<Duration> {
        (self.control.timeout_secs > 0).then(|| Duration::from_secs(self.control.timeout_secs))
    }

    /// Settings store path, falling back to the backend's default location.
    pub fn settings_path(&self, paths: &WatchdogPaths) -> PathBuf {
        match (&self.settings.path, self.settings.backend) {
            (Some(path), _) => path.clone(),
            (None, SettingsBackend::Sqlite) => paths.settings_db.clone(),
            (None, SettingsBackend::File) => paths.settings_toml.clone(),
        }
    }
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<WatchdogConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read watchdog config at {}", path.display()))?;
    let config: WatchdogConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse watchdog config at {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if an existing file is unreadable or invalid.
pub fn load_config_or_default(path: &Path) -> anyhow::Result<WatchdogConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(WatchdogConfig::default())
    }
}

/// Load the configuration the CLI asked for.
///
/// An explicit path must exist; only the default `watchdog.toml` may be
/// absent, in which case the built-in defaults apply.
///
/// # Errors
///
/// Returns an error if the explicit file is missing, or if the chosen file
/// is unreadable or invalid.
pub fn resolve_config(
    explicit: Option<&Path>,
    paths: &WatchdogPaths,
) -> anyhow::Result<WatchdogConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => load_config_or_default(&paths.config_toml),
    }
}

/// Resolve the default root directory (`~/.watchdog/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".watchdog"))
}

/// Resolve all default paths under `~/.watchdog/`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn watchdog_paths() -> anyhow::Result<WatchdogPaths> {
    let root = config_dir()?;
    Ok(WatchdogPaths {
        config_toml: root.join("watchdog.toml"),
        env_file: root.join(".env"),
        settings_db: root.join("settings.db"),
        settings_toml: root.join("settings.toml"),
        root,
    })
}

// Default value functions for serde.

fn default_reload_secs() -> u64 {
    900
}

fn default_settings_retry_secs() -> u64 {
    60
}

fn default_control_timeout_secs() -> u64 {
    30
}

fn default_bot_token_env() -> String {
    "WATCHDOG_TELEGRAM_TOKEN".to_owned()
}

fn default_prefix() -> String {
    "Watchdog".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_webhook_url_env() -> String {
    "WATCHDOG_WEBHOOK_URL".to_owned()
}
