//! Log setup for the daemon and the one-shot commands.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! `[logging] level`. With a log directory (`[logging] dir` or `--log`)
//! records also go to a daily-rotated JSON file, so a long-running daemon
//! leaves a machine-readable trail of every down/up transition.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// File name prefix of the rotated JSON logs (`watchdog.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "watchdog.log";

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Human-readable records on stderr only.
    Console,
    /// Console plus JSON records in a rotating file under the directory.
    File(PathBuf),
}

impl LogTarget {
    /// Pick the target: the CLI override wins over the configured directory.
    pub fn resolve(cli_dir: Option<&Path>, config: &LoggingConfig) -> Self {
        match cli_dir.or(config.dir.as_deref()) {
            Some(dir) => Self::File(dir.to_path_buf()),
            None => Self::Console,
        }
    }
}

/// Keeps the background file writer alive; dropping it flushes the file.
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Parse a filter directive such as `"info"` or `"watchdog=debug,sqlx=warn"`.
///
/// # Errors
///
/// Returns an error if the directive is not a valid filter.
pub fn filter_for(directive: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(directive.trim())
        .with_context(|| format!("invalid log filter `{directive}`"))
}

/// Install the global subscriber for `target`.
///
/// # Errors
///
/// Returns an error if the configured filter is invalid, the log directory
/// cannot be created, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig, target: &LogTarget) -> anyhow::Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_writer = match target {
        LogTarget::Console => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .context("a global logger is already installed")?;
            None
        }
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let json = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(json)
                .try_init()
                .context("a global logger is already installed")?;
            Some(guard)
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        target = ?target,
        "logging initialised"
    );
    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}
