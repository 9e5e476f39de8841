//! Watchdog engine: check cycles, bounded restart attempts, reload cadence.
//!
//! Lifecycle: `Unconfigured → Configured → Watching → (Reloaded | Faulted)`.
//! [`Watchdog::setup`] installs a context from any state.
//! [`Watchdog::watch`] runs check cycles until the reload budget elapses
//! (returns `Ok`) or a check cannot reach the service manager (returns
//! `Err`).
//!
//! Within one cycle every service is checked on its own Tokio task. The
//! cycle ends only when all checks, including their retries, are done. The
//! reload budget is consulted before each cycle, never in the middle of one.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::WatchdogContext;
use crate::error::{ExecutionError, WatchdogError};
use crate::notify::Notifier;
use crate::service::Service;

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// No context installed yet; `watch()` fails.
    Unconfigured,
    /// A context is installed and `watch()` may run.
    Configured,
    /// `watch()` is running check cycles.
    Watching,
    /// The last `watch()` returned because its reload budget elapsed.
    Reloaded,
    /// The last `watch()` failed on a service-control error.
    Faulted,
}

/// Result of checking one service within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The first ping found the service active.
    Up,
    /// The service was down and came back after `attempts` start attempts.
    Recovered {
        /// 1-based index of the attempt that succeeded.
        attempts: u32,
    },
    /// The service was down and stayed down after `attempts` start attempts.
    Failed {
        /// Attempts made (the configured maximum).
        attempts: u32,
    },
}

/// Per-service outcome of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    /// Unit name of the checked service.
    pub unit: String,
    /// What the check concluded.
    pub outcome: CheckOutcome,
}

/// Logs a notification and forwards it to the configured sink.
#[derive(Clone, Default)]
struct Propagator {
    notifier: Option<Arc<dyn Notifier>>,
}

impl Propagator {
    async fn propagate(&self, message: String) {
        info!("{message}");
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.publish(&message).await {
                warn!(sink = notifier.name(), error = %e, "failed to publish notification");
            }
        }
    }
}

/// Supervises the services of the installed [`WatchdogContext`].
pub struct Watchdog {
    context: Option<Arc<WatchdogContext>>,
    propagator: Propagator,
    reload_budget: Option<Duration>,
    state: WatchdogState,
}

impl Watchdog {
    /// Create an unconfigured engine.
    ///
    /// `reload_budget` bounds how long one `watch()` call keeps starting new
    /// cycles; `None` keeps watching until a fault.
    pub fn new(notifier: Option<Arc<dyn Notifier>>, reload_budget: Option<Duration>) -> Self {
        Self {
            context: None,
            propagator: Propagator { notifier },
            reload_budget,
            state: WatchdogState::Unconfigured,
        }
    }

    /// Install `context`, replacing any previous one wholesale.
    pub fn setup(&mut self, context: WatchdogContext) {
        debug!(
            services = context.services().len(),
            check_interval_secs = context.check_interval_secs(),
            retry_wait_secs = context.retry_wait_secs(),
            max_attempts = context.max_attempts(),
            "watchdog configured"
        );
        self.context = Some(Arc::new(context));
        self.state = WatchdogState::Configured;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Installed context, if any.
    pub fn context(&self) -> Option<&WatchdogContext> {
        self.context.as_deref()
    }

    /// Reload budget this engine was built with.
    pub fn reload_budget(&self) -> Option<Duration> {
        self.reload_budget
    }

    /// Run check cycles until the reload budget elapses.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::NotConfigured`] without checking anything if
    /// no context was installed, and [`WatchdogError::Execution`] (or
    /// [`WatchdogError::CheckPanicked`]) if a check failed fatally.
    pub async fn watch(&mut self) -> Result<(), WatchdogError> {
        if self.context.is_none() {
            return Err(WatchdogError::NotConfigured);
        }

        self.state = WatchdogState::Watching;
        let started = Instant::now();
        info!(
            reload_budget_secs = ?self.reload_budget.map(|b| b.as_secs()),
            "watching services"
        );

        loop {
            if let Some(budget) = self.reload_budget {
                if started.elapsed() >= budget {
                    info!("reload budget elapsed, handing control back for reload");
                    self.state = WatchdogState::Reloaded;
                    return Ok(());
                }
            }

            // Snapshot per cycle; a new context only takes effect between cycles.
            let Some(context) = self.context.clone() else {
                return Err(WatchdogError::NotConfigured);
            };

            match run_checks(&context, &self.propagator).await {
                Ok(reports) => log_cycle(&reports),
                Err(e) => {
                    error!(error = %e, "check cycle aborted");
                    self.state = WatchdogState::Faulted;
                    return Err(e);
                }
            }

            tokio::time::sleep(context.check_interval()).await;
        }
    }

    /// Run exactly one check cycle and report per-service outcomes.
    ///
    /// Reports are in configuration order. Does not change [`Self::state`].
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::watch`].
    pub async fn run_cycle(&self) -> Result<Vec<ServiceReport>, WatchdogError> {
        let context = self.context.clone().ok_or(WatchdogError::NotConfigured)?;
        run_checks(&context, &self.propagator).await
    }
}

/// Check every service concurrently and wait for all of them.
///
/// A fatal error from one check does not cancel its siblings; the first
/// error is returned once every task has finished.
async fn run_checks(
    context: &Arc<WatchdogContext>,
    propagator: &Propagator,
) -> Result<Vec<ServiceReport>, WatchdogError> {
    let services = context.services();
    let mut tasks = JoinSet::new();

    for (index, service) in services.iter().enumerate() {
        let service = service.clone();
        let propagator = propagator.clone();
        let retry_wait = context.retry_wait();
        let max_attempts = context.max_attempts();
        tasks.spawn(async move {
            let outcome = check_service(&service, retry_wait, max_attempts, &propagator).await;
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<CheckOutcome>> = vec![None; services.len()];
    let mut finished = vec![false; services.len()];
    let mut first_error: Option<WatchdogError> = None;
    let mut join_failure: Option<String> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Some(done) = finished.get_mut(index) {
                    *done = true;
                }
                match result {
                    Ok(outcome) => {
                        if let Some(slot) = outcomes.get_mut(index) {
                            *slot = Some(outcome);
                        }
                    }
                    Err(e) => {
                        let unit = services.get(index).map(Service::unit).unwrap_or("?");
                        error!(service = %unit, error = %e, "service control unavailable");
                        first_error.get_or_insert(WatchdogError::Execution(e));
                    }
                }
            }
            Err(e) => {
                join_failure.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    if let Some(detail) = join_failure {
        let service = services
            .iter()
            .zip(&finished)
            .find(|(_, done)| !**done)
            .map(|(service, _)| service.unit().to_owned())
            .unwrap_or_default();
        return Err(WatchdogError::CheckPanicked { service, detail });
    }

    Ok(services
        .iter()
        .zip(outcomes)
        .filter_map(|(service, outcome)| {
            outcome.map(|outcome| ServiceReport {
                unit: service.unit().to_owned(),
                outcome,
            })
        })
        .collect())
}

/// Ping one service and, if it is down, try to start it up to
/// `max_attempts` times.
async fn check_service(
    service: &Service,
    retry_wait: Duration,
    max_attempts: u32,
    propagator: &Propagator,
) -> Result<CheckOutcome, ExecutionError> {
    info!("({service}): checking...");

    if service.ping().await? {
        info!("({service}): service is up");
        return Ok(CheckOutcome::Up);
    }

    propagator
        .propagate(format!("({service}): service is down"))
        .await;

    for attempt in 1..=max_attempts {
        info!("({service}): attempt to start service ({attempt})");

        // The ping below is the source of truth, not the start status.
        let accepted = service.start().await?;
        debug!(service = %service, attempt, accepted, "start command finished");

        if service.ping().await? {
            propagator
                .propagate(format!(
                    "({service}): service is up after {attempt} attempt(s)"
                ))
                .await;
            return Ok(CheckOutcome::Recovered { attempts: attempt });
        }

        if attempt < max_attempts {
            tokio::time::sleep(retry_wait).await;
        }
    }

    if max_attempts == 0 {
        warn!("({service}): recovery disabled, no start attempted");
    } else {
        propagator
            .propagate(format!(
                "({service}): failed to start after {max_attempts} attempt(s)"
            ))
            .await;
    }

    Ok(CheckOutcome::Failed {
        attempts: max_attempts,
    })
}

fn log_cycle(reports: &[ServiceReport]) {
    let down = reports
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Failed { .. }))
        .count();
    let recovered = reports
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Recovered { .. }))
        .count();
    debug!(
        checked = reports.len(),
        recovered, down, "check cycle complete"
    );
}
