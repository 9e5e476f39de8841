//! Watchdog CLI entry point.
//!
//! Provides `start` (run the supervisory daemon), `check` (one cycle and
//! exit), `settings` (inspect or store raw settings) and `service` (drive
//! the service manager directly).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use watchdog::app::{Application, ApplicationContext};
use watchdog::config::{resolve_config, watchdog_paths, SettingsBackend, WatchdogConfig};
use watchdog::context::{
    RawSettings, LIST_OF_SERVICES, NUM_OF_ATTEMPTS, NUM_OF_SEC_CHECK, NUM_OF_SEC_WAIT,
};
use watchdog::credentials::{load_credentials, Credentials};
use watchdog::engine::{CheckOutcome, Watchdog};
use watchdog::logging::LogTarget;
use watchdog::notify::telegram::TelegramNotifier;
use watchdog::notify::webhook::WebhookNotifier;
use watchdog::notify::{FanoutNotifier, Notifier};
use watchdog::service::systemd::Systemctl;
use watchdog::service::{Service, ServiceControl};
use watchdog::settings::file::FileSettingsStore;
use watchdog::settings::sqlite::SqliteSettingsStore;
use watchdog::settings::{put_validated, read_document, SettingsStore};

/// Watchdog: keeps systemd services running.
#[derive(Parser)]
#[command(name = "watchdog", version, about)]
struct Cli {
    /// Daemon configuration file (default `~/.watchdog/watchdog.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credentials file (default `~/.watchdog/.env`).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Directory for rotating JSON log files; console only when omitted.
    #[arg(short = 'l', long = "log", global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the supervisory daemon.
    Start {
        /// Settings identifier to watch.
        #[arg(short, long)]
        id: String,
    },
    /// Run a single check cycle and exit.
    Check {
        /// Settings identifier to check.
        #[arg(short, long)]
        id: String,
    },
    /// Inspect or store raw settings documents.
    Settings {
        /// Settings action.
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Query or control a single service.
    Service {
        /// Service action.
        #[command(subcommand)]
        action: ServiceCommand,
    },
}

/// Settings subcommands.
#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the stored document, or list identifiers when no id is given.
    Show {
        /// Settings identifier.
        #[arg(short, long)]
        id: Option<String>,
    },
    /// Validate a TOML/JSON document and store it.
    Put {
        /// Settings identifier.
        #[arg(short, long)]
        id: String,
        /// Document with `ListOfServices`, `NumOfSecCheck`, `NumOfSecWait`, `NumOfAttempts`.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Build a document from flags, validate it and store it.
    Set {
        /// Settings identifier.
        #[arg(short, long)]
        id: String,
        /// Service to watch (repeatable; none means idle).
        #[arg(short, long = "service")]
        services: Vec<String>,
        /// Seconds between check cycles.
        #[arg(long)]
        check: u64,
        /// Seconds between start attempts.
        #[arg(long)]
        wait: u64,
        /// Start attempts per cycle.
        #[arg(long)]
        attempts: u32,
    },
}

/// Single-service subcommands.
#[derive(Subcommand)]
enum ServiceCommand {
    /// Report whether the service is active.
    Ping {
        /// Service name (without `.service`).
        name: String,
    },
    /// Start the service.
    Start {
        /// Service name (without `.service`).
        name: String,
    },
    /// Stop the service.
    Stop {
        /// Service name (without `.service`).
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = watchdog_paths()?;
    let config = resolve_config(cli.config.as_deref(), &paths)?;

    let log_target = LogTarget::resolve(cli.log_dir.as_deref(), &config.logging);
    let _logging_guard = watchdog::logging::init(&config.logging, &log_target)?;

    let env_path = cli.env_file.clone().unwrap_or_else(|| paths.env_file.clone());
    let settings_path = config.settings_path(&paths);

    match cli.command {
        Command::Start { id } => handle_start(&config, &settings_path, &env_path, id).await,
        Command::Check { id } => handle_check(&config, &settings_path, &env_path, id).await,
        Command::Settings { action } => handle_settings(&config, &settings_path, action).await,
        Command::Service { action } => handle_service(&config, action).await,
    }
}

/// Run the supervisory daemon until Ctrl-C or a fault.
async fn handle_start(
    config: &WatchdogConfig,
    settings_path: &Path,
    env_path: &Path,
    id: String,
) -> anyhow::Result<()> {
    let store = open_store(config, settings_path).await?;
    let control = build_control(config);
    let credentials = load_sink_credentials(config, env_path)?;
    let notifier = build_notifier(config, &credentials)?;

    info!(
        settings_id = %id,
        settings = %settings_path.display(),
        backend = ?config.settings.backend,
        reload_secs = config.engine.reload_secs,
        "watchdog starting"
    );
    let mut app = Application::new(
        store,
        control,
        notifier,
        ApplicationContext {
            settings_id: id,
            reload_budget: config.reload_budget(),
            settings_retry: config.settings_retry(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    app.run(shutdown_rx).await
}

/// Validate settings, run one cycle and print per-service outcomes.
async fn handle_check(
    config: &WatchdogConfig,
    settings_path: &Path,
    env_path: &Path,
    id: String,
) -> anyhow::Result<()> {
    let store = open_store(config, settings_path).await?;
    let control = build_control(config);
    let credentials = load_sink_credentials(config, env_path)?;
    let notifier = build_notifier(config, &credentials)?;

    let app = Application::new(
        store,
        control,
        None,
        ApplicationContext {
            settings_id: id.clone(),
            reload_budget: config.reload_budget(),
            settings_retry: config.settings_retry(),
        },
    );
    let context = app
        .load_context()
        .await?
        .ok_or_else(|| anyhow::anyhow!("no settings stored under `{id}`"))?;

    let mut engine = Watchdog::new(notifier, None);
    engine.setup(context);
    let reports = engine.run_cycle().await?;

    for report in &reports {
        let status = match report.outcome {
            CheckOutcome::Up => "up".to_owned(),
            CheckOutcome::Recovered { attempts } => format!("recovered after {attempts} attempt(s)"),
            CheckOutcome::Failed { attempts } => format!("down after {attempts} attempt(s)"),
        };
        println!("{}: {status}", report.unit);
    }
    if reports.is_empty() {
        println!("no services configured under `{id}`");
    }
    Ok(())
}

/// Show or store a raw settings document.
async fn handle_settings(
    config: &WatchdogConfig,
    settings_path: &Path,
    action: SettingsCommand,
) -> anyhow::Result<()> {
    let store = open_store(config, settings_path).await?;

    match action {
        SettingsCommand::Show { id: Some(id) } => {
            let raw = store
                .fetch(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no settings stored under `{id}`"))?;
            println!("{}", serde_json::to_string_pretty(&raw)?);
        }
        SettingsCommand::Show { id: None } => {
            let ids = store.ids().await?;
            if ids.is_empty() {
                println!("no settings stored in {}", settings_path.display());
            }
            for id in ids {
                println!("{id}");
            }
        }
        SettingsCommand::Put { id, file } => {
            let raw = read_document(&file)?;
            let context = put_validated(store.as_ref(), &id, &raw, build_control(config))
                .await
                .with_context(|| format!("refusing to store settings from {}", file.display()))?;
            info!(
                id = %id,
                source = %file.display(),
                services = context.services().len(),
                "settings stored"
            );
        }
        SettingsCommand::Set {
            id,
            services,
            check,
            wait,
            attempts,
        } => {
            let raw = RawSettings::new()
                .with(LIST_OF_SERVICES, services)
                .with(NUM_OF_SEC_CHECK, check)
                .with(NUM_OF_SEC_WAIT, wait)
                .with(NUM_OF_ATTEMPTS, attempts);
            let context = put_validated(store.as_ref(), &id, &raw, build_control(config))
                .await
                .context("refusing to store settings")?;
            info!(id = %id, services = context.services().len(), "settings stored");
        }
    }
    Ok(())
}

/// Drive the service manager for one service.
async fn handle_service(config: &WatchdogConfig, action: ServiceCommand) -> anyhow::Result<()> {
    let control = build_control(config);
    let (verb, name) = match &action {
        ServiceCommand::Ping { name } => ("ping", name),
        ServiceCommand::Start { name } => ("start", name),
        ServiceCommand::Stop { name } => ("stop", name),
    };
    let service = Service::new(name.as_str(), control);

    let ok = match action {
        ServiceCommand::Ping { .. } => service.ping().await?,
        ServiceCommand::Start { .. } => service.start().await?,
        ServiceCommand::Stop { .. } => service.stop().await?,
    };

    let result = match (verb, ok) {
        ("ping", true) => "active",
        ("ping", false) => "inactive",
        (_, true) => "ok",
        (_, false) => "failed",
    };
    println!("{service}: {verb} {result}");
    Ok(())
}

async fn open_store(
    config: &WatchdogConfig,
    settings_path: &Path,
) -> anyhow::Result<Arc<dyn SettingsStore>> {
    let store: Arc<dyn SettingsStore> = match config.settings.backend {
        SettingsBackend::Sqlite => Arc::new(
            SqliteSettingsStore::open(settings_path)
                .await
                .with_context(|| format!("failed to open {}", settings_path.display()))?,
        ),
        SettingsBackend::File => Arc::new(FileSettingsStore::new(settings_path)),
    };
    Ok(store)
}

fn build_control(config: &WatchdogConfig) -> Arc<dyn ServiceControl> {
    Arc::new(
        Systemctl::new()
            .with_sudo(config.control.use_sudo)
            .with_user_mode(config.control.user_mode)
            .with_timeout(config.control_timeout()),
    )
}

fn load_sink_credentials(config: &WatchdogConfig, env_path: &Path) -> anyhow::Result<Credentials> {
    load_credentials(
        env_path,
        &[
            config.telegram.bot_token_env.as_str(),
            config.webhook.url_env.as_str(),
        ],
    )
}

/// Assemble the configured notification sinks.
fn build_notifier(
    config: &WatchdogConfig,
    credentials: &Credentials,
) -> anyhow::Result<Option<Arc<dyn Notifier>>> {
    let mut sinks: Vec<Arc<dyn Notifier>> = Vec::new();

    if !config.telegram.notify_users.is_empty() {
        match credentials.get(&config.telegram.bot_token_env) {
            Some(token) => {
                let telegram = TelegramNotifier::new(
                    token,
                    config.telegram.notify_users.clone(),
                    config.telegram.prefix.clone(),
                );
                info!(chats = telegram.notify_users().len(), "telegram notifications enabled");
                sinks.push(Arc::new(telegram));
            }
            None => warn!(
                credential = %config.telegram.bot_token_env,
                "telegram users configured but bot token missing, telegram disabled"
            ),
        }
    }

    if let Some(url) = credentials.get(&config.webhook.url_env) {
        sinks.push(Arc::new(
            WebhookNotifier::new(url).context("failed to build webhook notifier")?,
        ));
    }

    let fanout = FanoutNotifier::new(sinks);
    if fanout.is_empty() {
        info!("no notification sinks configured, notifications are logged only");
        return Ok(None);
    }
    info!(sinks = fanout.len(), "notification sinks ready");
    Ok(Some(Arc::new(fanout)))
}
