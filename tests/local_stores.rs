//! Persisted local stores on top of directory-backed storage.

use std::sync::Arc;

use quire::domain::todos::Filter;
use quire::infra::storage::FileStorage;
use quire::stores::{LocalStorage, SelectionStore, TodoStore};
use serde_json::Value;
use tempfile::tempdir;

fn open(storage: &Arc<FileStorage>) -> TodoStore {
    let storage: Arc<dyn LocalStorage> = storage.clone();
    TodoStore::new(storage)
}

#[test]
fn todos_survive_a_restart_but_filter_does_not() {
    let dir = tempdir().expect("tempdir");
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).expect("storage"));

    let first = open(&storage);
    let milk = first.add("buy milk").expect("added");
    first.add("walk dog").expect("added");
    assert!(first.toggle(&milk));
    first.set_filter(Filter::Completed);
    drop(first);

    let second = open(&storage);
    assert_eq!(second.filter(), Filter::All);
    let todos = second.todos();
    assert_eq!(
        todos.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
        ["buy milk", "walk dog"]
    );
    assert!(todos[0].completed);

    assert_eq!(second.clear_completed(), 1);
    drop(second);
    assert_eq!(open(&storage).todos().len(), 1);
}

#[test]
fn blob_uses_versioned_envelope() {
    let dir = tempdir().expect("tempdir");
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).expect("storage"));

    open(&storage).add("inspect me").expect("added");

    let raw = std::fs::read_to_string(dir.path().join("todo-storage.json")).expect("blob");
    let blob: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(blob["version"], 0);
    assert_eq!(blob["state"]["todos"][0]["text"], "inspect me");
    assert!(blob["state"].get("filter").is_none());
}

#[test]
fn corrupt_blob_starts_empty_and_is_overwritten() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("todo-storage.json"), "{not json").expect("seed corrupt blob");
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).expect("storage"));

    let store = open(&storage);
    assert!(store.todos().is_empty());

    store.add("fresh start").expect("added");
    assert_eq!(open(&storage).todos().len(), 1);
}

#[test]
fn stores_keep_separate_blobs() {
    let dir = tempdir().expect("tempdir");
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).expect("storage"));

    open(&storage).add("todo").expect("added");
    let shared: Arc<dyn LocalStorage> = storage.clone();
    let selection = SelectionStore::new(shared.clone());
    selection.set_selected_post_id(Some(9));

    assert!(dir.path().join("query-storage.json").exists());
    assert_eq!(SelectionStore::new(shared).current().selected_post_id, Some(9));
    assert_eq!(open(&storage).todos().len(), 1);
}
