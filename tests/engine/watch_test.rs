//! Tests for the `watch()` loop: lifecycle states and reload cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use watchdog::engine::{Watchdog, WatchdogState};
use watchdog::error::WatchdogError;
use watchdog::notify::Notifier;

use crate::support::{context, FakeControl, RecordingNotifier};

#[tokio::test]
async fn new_engine_is_unconfigured() {
    let engine = Watchdog::new(None, Some(Duration::from_secs(60)));
    assert_eq!(engine.state(), WatchdogState::Unconfigured);
    assert!(engine.context().is_none());
    assert_eq!(engine.reload_budget(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn watch_without_setup_fails_and_checks_nothing() {
    let mut engine = Watchdog::new(None, Some(Duration::from_secs(60)));
    let result = engine.watch().await;
    assert!(matches!(result, Err(WatchdogError::NotConfigured)));
    assert_eq!(engine.state(), WatchdogState::Unconfigured);
}

#[tokio::test]
async fn setup_moves_to_configured() {
    let control = Arc::new(FakeControl::new());
    let mut engine = Watchdog::new(None, None);
    engine.setup(context(&["nginx", "redis"], 5, 1, 2, &control));

    assert_eq!(engine.state(), WatchdogState::Configured);
    let installed = engine.context().expect("context installed");
    assert_eq!(installed.services().len(), 2);
    assert_eq!(installed.check_interval_secs(), 5);
}

#[tokio::test(start_paused = true)]
async fn empty_context_idles_until_budget() {
    let control = Arc::new(FakeControl::new());
    let mut engine = Watchdog::new(None, Some(Duration::from_secs(12)));
    engine.setup(context(&[], 5, 1, 2, &control));

    let started = Instant::now();
    engine.watch().await.expect("reload");

    // Cycles start at 0s, 5s and 10s; the budget is seen at 15s.
    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(engine.state(), WatchdogState::Reloaded);
}

#[tokio::test(start_paused = true)]
async fn zero_budget_returns_before_any_cycle() {
    let control = Arc::new(FakeControl::new().unit("nginx.service", &[], true));
    let mut engine = Watchdog::new(None, Some(Duration::ZERO));
    engine.setup(context(&["nginx"], 5, 1, 2, &control));

    engine.watch().await.expect("reload");

    assert_eq!(control.pings("nginx.service"), 0);
    assert_eq!(engine.state(), WatchdogState::Reloaded);
}

#[tokio::test(start_paused = true)]
async fn each_cycle_checks_every_service() {
    let control = Arc::new(
        FakeControl::new()
            .unit("a.service", &[], true)
            .unit("b.service", &[], true),
    );
    let mut engine = Watchdog::new(None, Some(Duration::from_secs(25)));
    engine.setup(context(&["a", "b"], 10, 1, 2, &control));

    engine.watch().await.expect("reload");

    // Cycles at 0s, 10s and 20s.
    assert_eq!(control.pings("a.service"), 3);
    assert_eq!(control.pings("b.service"), 3);
}

#[tokio::test(start_paused = true)]
async fn budget_never_interrupts_a_cycle() {
    let control = Arc::new(FakeControl::new().unit("mysql.service", &[], false));
    let notifier = Arc::new(RecordingNotifier::new());
    let sink: Arc<dyn Notifier> = Arc::clone(&notifier) as Arc<dyn Notifier>;
    let mut engine = Watchdog::new(Some(sink), Some(Duration::from_secs(5)));
    engine.setup(context(&["mysql"], 1, 10, 3, &control));

    let started = Instant::now();
    engine.watch().await.expect("reload");

    // The single cycle runs its three attempts (20s of waits) to the end,
    // then sleeps the check interval before the budget is seen.
    assert_eq!(started.elapsed(), Duration::from_secs(21));
    assert_eq!(control.starts("mysql.service"), 3);
    assert_eq!(
        notifier.messages().last().map(String::as_str),
        Some("(mysql.service): failed to start after 3 attempt(s)")
    );
}

#[tokio::test(start_paused = true)]
async fn retries_restart_from_one_every_cycle() {
    let control = Arc::new(FakeControl::new().unit("mysql.service", &[], false));
    let notifier = Arc::new(RecordingNotifier::new());
    let sink: Arc<dyn Notifier> = Arc::clone(&notifier) as Arc<dyn Notifier>;
    let mut engine = Watchdog::new(Some(sink), Some(Duration::from_secs(10)));
    engine.setup(context(&["mysql"], 5, 0, 2, &control));

    engine.watch().await.expect("reload");

    // Cycles at 0s and 5s, each with a full set of attempts.
    assert_eq!(control.starts("mysql.service"), 4);
    let failures = notifier
        .messages()
        .iter()
        .filter(|m| m.ends_with("failed to start after 2 attempt(s)"))
        .count();
    assert_eq!(failures, 2);
}

#[tokio::test(start_paused = true)]
async fn control_failure_faults_the_engine() {
    let control = Arc::new(FakeControl::new().broken("nginx.service"));
    let mut engine = Watchdog::new(None, Some(Duration::from_secs(60)));
    engine.setup(context(&["nginx"], 5, 1, 2, &control));

    let result = engine.watch().await;

    assert!(matches!(result, Err(WatchdogError::Execution(_))));
    assert_eq!(engine.state(), WatchdogState::Faulted);

    // A fresh setup recovers from the fault.
    let healthy = Arc::new(FakeControl::new());
    engine.setup(context(&["nginx"], 5, 1, 2, &healthy));
    assert_eq!(engine.state(), WatchdogState::Configured);
}

#[tokio::test(start_paused = true)]
async fn setup_after_reload_installs_new_services() {
    let control = Arc::new(FakeControl::new());
    let mut engine = Watchdog::new(None, Some(Duration::from_secs(1)));
    engine.setup(context(&["old"], 5, 1, 2, &control));
    engine.watch().await.expect("reload");
    assert_eq!(control.pings("old.service"), 1);

    engine.setup(context(&["new"], 5, 1, 2, &control));
    engine.watch().await.expect("reload");

    assert_eq!(control.pings("old.service"), 1);
    assert_eq!(control.pings("new.service"), 1);
    assert_eq!(engine.state(), WatchdogState::Reloaded);
}
