//! Application driver: fetch settings, configure the engine, watch, repeat.
//!
//! Each round fetches the raw settings document by identifier, validates it
//! into a fresh [`WatchdogContext`] and runs [`Watchdog::watch`] until the
//! reload budget hands control back. Settings problems are logged and never
//! stop the loop; a [`crate::error::WatchdogError`] does.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::context::WatchdogContext;
use crate::engine::Watchdog;
use crate::notify::Notifier;
use crate::service::ServiceControl;
use crate::settings::SettingsStore;

/// Driver parameters.
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    /// Identifier of the settings document to watch.
    pub settings_id: String,
    /// How long one `watch()` run lasts before settings are refetched.
    pub reload_budget: Duration,
    /// Wait before refetching when there are no usable settings at all.
    pub settings_retry: Duration,
}

/// Supervisory loop around a [`Watchdog`].
pub struct Application {
    store: Arc<dyn SettingsStore>,
    control: Arc<dyn ServiceControl>,
    context: ApplicationContext,
    watchdog: Watchdog,
}

impl Application {
    /// Build a driver. `notifier` receives every status notification.
    pub fn new(
        store: Arc<dyn SettingsStore>,
        control: Arc<dyn ServiceControl>,
        notifier: Option<Arc<dyn Notifier>>,
        context: ApplicationContext,
    ) -> Self {
        let watchdog = Watchdog::new(notifier, Some(context.reload_budget));
        Self {
            store,
            control,
            context,
            watchdog,
        }
    }

    /// The supervised engine.
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Fetch and validate the current settings.
    ///
    /// Returns `Ok(None)` when nothing is stored under the identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the document is invalid.
    pub async fn load_context(&self) -> anyhow::Result<Option<WatchdogContext>> {
        let id = &self.context.settings_id;
        let Some(raw) = self
            .store
            .fetch(id)
            .await
            .with_context(|| format!("failed to fetch settings `{id}`"))?
        else {
            return Ok(None);
        };

        let context = WatchdogContext::from_raw(&raw, Arc::clone(&self.control))
            .with_context(|| format!("invalid watchdog settings `{id}`"))?;
        Ok(Some(context))
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped), or
    /// until the engine faults.
    ///
    /// # Errors
    ///
    /// Returns the engine's [`crate::error::WatchdogError`] when a check
    /// cannot reach the service manager.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(settings_id = %self.context.settings_id, "watchdog application started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.refresh().await {
                tokio::select! {
                    () = tokio::time::sleep(self.context.settings_retry) => continue,
                    () = wait_for_shutdown(&mut shutdown) => break,
                }
            }

            tokio::select! {
                result = self.watchdog.watch() => {
                    if let Err(e) = result {
                        error!(error = %e, "watchdog faulted, stopping");
                        return Err(e.into());
                    }
                }
                () = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("watchdog application stopped");
        Ok(())
    }

    /// Install fresh settings if possible. Returns whether the engine has a
    /// context to watch.
    async fn refresh(&mut self) -> bool {
        let id = &self.context.settings_id;
        let problem = match self.load_context().await {
            Ok(Some(context)) => {
                info!(
                    settings_id = %id,
                    services = context.services().len(),
                    check_interval_secs = context.check_interval_secs(),
                    retry_wait_secs = context.retry_wait_secs(),
                    max_attempts = context.max_attempts(),
                    "settings loaded"
                );
                self.watchdog.setup(context);
                return true;
            }
            Ok(None) => format!("no settings stored under `{id}`"),
            Err(e) => format!("{e:#}"),
        };

        if self.watchdog.context().is_some() {
            warn!(settings_id = %id, problem = %problem, "keeping previous settings");
            true
        } else {
            warn!(
                settings_id = %id,
                problem = %problem,
                retry_secs = self.context.settings_retry.as_secs(),
                "no usable settings yet"
            );
            false
        }
    }
}

/// Resolve once the shutdown flag is set or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
