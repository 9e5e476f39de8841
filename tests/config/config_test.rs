//! Coverage for config parsing and path resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use watchdog::config::{
    config_dir, load_config, load_config_or_default, resolve_config, watchdog_paths,
    SettingsBackend, WatchdogConfig, WatchdogPaths,
};

fn paths_under(root: &Path) -> WatchdogPaths {
    WatchdogPaths {
        root: root.to_path_buf(),
        config_toml: root.join("watchdog.toml"),
        env_file: root.join(".env"),
        settings_db: root.join("settings.db"),
        settings_toml: root.join("settings.toml"),
    }
}

#[test]
fn defaults() {
    let config = WatchdogConfig::default();
    assert_eq!(config.engine.reload_secs, 900);
    assert_eq!(config.engine.settings_retry_secs, 60);
    assert_eq!(config.settings.backend, SettingsBackend::Sqlite);
    assert!(config.settings.path.is_none());
    assert!(!config.control.use_sudo);
    assert!(!config.control.user_mode);
    assert_eq!(config.control.timeout_secs, 30);
    assert_eq!(config.telegram.bot_token_env, "WATCHDOG_TELEGRAM_TOKEN");
    assert!(config.telegram.notify_users.is_empty());
    assert_eq!(config.telegram.prefix, "Watchdog");
    assert_eq!(config.webhook.url_env, "WATCHDOG_WEBHOOK_URL");
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.dir.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn empty_file_is_all_defaults() {
    let config: WatchdogConfig = toml::from_str("").expect("empty config parses");
    assert_eq!(config.reload_budget(), Duration::from_secs(900));
    assert_eq!(config.settings_retry(), Duration::from_secs(60));
    assert_eq!(config.control_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn parse_full_config() {
    let toml_str = r#"
[engine]
reload_secs = 300
settings_retry_secs = 15

[settings]
backend = "file"
path = "/etc/watchdog/settings.toml"

[control]
use_sudo = true
user_mode = false
timeout_secs = 0

[telegram]
bot_token_env = "MY_BOT_TOKEN"
notify_users = [123456789, 987654321]
prefix = "edge-01"

[webhook]
url_env = "MY_HOOK"

[logging]
level = "watchdog=debug"
dir = "/var/log/watchdog"
"#;
    let config: WatchdogConfig = toml::from_str(toml_str).expect("config parses");
    assert!(config.validate().is_ok());
    assert_eq!(config.reload_budget(), Duration::from_secs(300));
    assert_eq!(config.settings_retry(), Duration::from_secs(15));
    assert_eq!(config.settings.backend, SettingsBackend::File);
    assert!(config.control.use_sudo);
    assert_eq!(config.control_timeout(), None);
    assert_eq!(config.telegram.notify_users, vec![123_456_789, 987_654_321]);
    assert_eq!(config.telegram.prefix, "edge-01");
    assert_eq!(config.webhook.url_env, "MY_HOOK");
    assert_eq!(config.logging.level, "watchdog=debug");
    assert_eq!(
        config.logging.dir.as_deref(),
        Some(Path::new("/var/log/watchdog"))
    );
}

#[test]
fn unknown_backend_is_rejected() {
    let result: Result<WatchdogConfig, _> = toml::from_str("[settings]\nbackend = \"redis\"\n");
    assert!(result.is_err());
}

#[test]
fn validate_rejects_zero_reload() {
    let mut config = WatchdogConfig::default();
    config.engine.reload_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_blank_credential_names() {
    let mut config = WatchdogConfig::default();
    config.telegram.bot_token_env = "  ".to_owned();
    assert!(config.validate().is_err());

    let mut config = WatchdogConfig::default();
    config.webhook.url_env = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn settings_path_follows_backend() {
    let root = PathBuf::from("/home/ops/.watchdog");
    let paths = paths_under(&root);

    let mut config = WatchdogConfig::default();
    assert_eq!(config.settings_path(&paths), root.join("settings.db"));

    config.settings.backend = SettingsBackend::File;
    assert_eq!(config.settings_path(&paths), root.join("settings.toml"));

    config.settings.path = Some(PathBuf::from("/srv/settings.json"));
    assert_eq!(
        config.settings_path(&paths),
        PathBuf::from("/srv/settings.json")
    );
}

#[test]
fn load_config_reads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("watchdog.toml");

    std::fs::write(&path, "[engine]\nreload_secs = 120\n").expect("write");
    let config = load_config(&path).expect("valid config");
    assert_eq!(config.engine.reload_secs, 120);

    std::fs::write(&path, "[engine]\nreload_secs = 0\n").expect("write");
    assert!(load_config(&path).is_err());
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    assert!(load_config(&path).is_err());
    let config = load_config_or_default(&path).expect("defaults");
    assert_eq!(config.engine.reload_secs, 900);
}

#[test]
fn validate_rejects_blank_log_level() {
    let mut config = WatchdogConfig::default();
    config.logging.level = " ".to_owned();
    assert!(config.validate().is_err());
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths_under(dir.path());
    let explicit = dir.path().join("elsewhere.toml");

    let err = resolve_config(Some(&explicit), &paths).expect_err("missing explicit config");
    assert!(format!("{err:#}").contains("elsewhere.toml"));

    let config = resolve_config(None, &paths).expect("default path may be absent");
    assert_eq!(config.engine.reload_secs, 900);
}

#[test]
fn explicit_config_wins_over_default_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths_under(dir.path());
    std::fs::write(&paths.config_toml, "[engine]\nreload_secs = 60\n").expect("write");
    let explicit = dir.path().join("override.toml");
    std::fs::write(&explicit, "[engine]\nreload_secs = 30\n").expect("write");

    assert_eq!(
        resolve_config(None, &paths).expect("default").engine.reload_secs,
        60
    );
    assert_eq!(
        resolve_config(Some(&explicit), &paths)
            .expect("explicit")
            .engine
            .reload_secs,
        30
    );
}

#[test]
fn config_dir_resolves() {
    let dir = config_dir();
    assert!(dir.is_ok());
    let path = match dir {
        Ok(path) => path,
        Err(err) => panic!("config dir should resolve: {err}"),
    };
    assert!(path.ends_with(".watchdog"));
}

#[test]
fn default_paths_live_under_root() {
    let paths = watchdog_paths().expect("paths resolve");
    assert!(paths.config_toml.starts_with(&paths.root));
    assert!(paths.config_toml.ends_with("watchdog.toml"));
    assert!(paths.env_file.ends_with(".env"));
    assert!(paths.settings_db.ends_with("settings.db"));
    assert!(paths.settings_toml.ends_with("settings.toml"));
}
