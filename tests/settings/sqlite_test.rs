//! SQLite settings store: schema setup, upsert and lookup.

use serde_json::json;

use watchdog::context::NUM_OF_SEC_CHECK;
use watchdog::settings::sqlite::SqliteSettingsStore;
use watchdog::settings::SettingsStore;

use crate::support::raw_settings;

async fn open_store(dir: &tempfile::TempDir) -> SqliteSettingsStore {
    SqliteSettingsStore::open(&dir.path().join("settings.db"))
        .await
        .expect("open settings db")
}

#[tokio::test]
async fn fetch_unknown_id_returns_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    let fetched = store.fetch("missing").await.expect("fetch");
    assert!(fetched.is_none());
}

#[tokio::test]
async fn put_then_fetch_returns_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    let raw = raw_settings(&["nginx", "redis"], 60, 10, 3);

    store.put("web", &raw).await.expect("put");
    let fetched = store.fetch("web").await.expect("fetch");

    assert_eq!(fetched, Some(raw));
}

#[tokio::test]
async fn put_replaces_existing_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;

    store
        .put("web", &raw_settings(&["nginx"], 60, 10, 3))
        .await
        .expect("first put");
    store
        .put("web", &raw_settings(&["nginx"], 60, 10, 3).with(NUM_OF_SEC_CHECK, json!(15)))
        .await
        .expect("second put");

    let fetched = store.fetch("web").await.expect("fetch").expect("present");
    assert_eq!(fetched.get(NUM_OF_SEC_CHECK), Some(&json!(15)));
    assert_eq!(store.ids().await.expect("ids"), vec!["web".to_owned()]);
}

#[tokio::test]
async fn ids_are_sorted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    for id in ["zeta", "alpha", "mid"] {
        store
            .put(id, &raw_settings(&[], 1, 1, 1))
            .await
            .expect("put");
    }
    assert_eq!(
        store.ids().await.expect("ids"),
        vec!["alpha".to_owned(), "mid".to_owned(), "zeta".to_owned()]
    );
}

#[tokio::test]
async fn documents_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = raw_settings(&["mysql"], 30, 5, 2);
    {
        let store = open_store(&dir).await;
        store.put("db", &raw).await.expect("put");
    }

    let reopened = open_store(&dir).await;
    assert_eq!(reopened.fetch("db").await.expect("fetch"), Some(raw));
}

#[tokio::test]
async fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("a").join("b").join("settings.db");
    let store = SqliteSettingsStore::open(&nested).await.expect("open");
    assert!(nested.exists());
    assert!(store.ids().await.expect("ids").is_empty());
}
