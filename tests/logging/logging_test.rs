//! Tests for `src/logging.rs`.

use std::path::{Path, PathBuf};

use watchdog::config::LoggingConfig;
use watchdog::logging::{filter_for, init, LogTarget, LoggingGuard, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn filter_accepts_levels_and_directives() {
    assert!(filter_for("info").is_ok());
    assert!(filter_for(" watchdog=debug,sqlx=warn ").is_ok());
}

#[test]
fn filter_rejects_garbage() {
    let err = filter_for("watchdog=notalevel").expect_err("invalid directive");
    assert!(err.to_string().contains("watchdog=notalevel"));
}

#[test]
fn target_prefers_cli_directory() {
    let mut config = LoggingConfig::default();
    assert_eq!(LogTarget::resolve(None, &config), LogTarget::Console);

    config.dir = Some(PathBuf::from("/var/log/watchdog"));
    assert_eq!(
        LogTarget::resolve(None, &config),
        LogTarget::File(PathBuf::from("/var/log/watchdog"))
    );
    assert_eq!(
        LogTarget::resolve(Some(Path::new("/tmp/wd-logs")), &config),
        LogTarget::File(PathBuf::from("/tmp/wd-logs"))
    );
}

// The global subscriber can only be installed once per process, so the
// whole install path lives in a single test.
#[test]
fn file_target_writes_startup_record() {
    std::env::remove_var("RUST_LOG");
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    let config = LoggingConfig::default();
    let target = LogTarget::File(logs_dir.clone());
    let guard = init(&config, &target).expect("first install succeeds");
    assert!(logs_dir.exists(), "logs directory should be created");
    drop(guard);

    let contents: String = std::fs::read_dir(&logs_dir)
        .expect("read logs dir")
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(LOG_FILE_PREFIX)
        })
        .map(|entry| std::fs::read_to_string(entry.path()).expect("read log file"))
        .collect();
    assert!(contents.contains("logging initialised"), "got: {contents}");
    assert!(contents.contains(env!("CARGO_PKG_VERSION")));

    assert!(init(&config, &LogTarget::Console).is_err());
}
