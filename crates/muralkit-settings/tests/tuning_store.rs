//! Tuning persistence through the storage file

use muralkit_settings::{LocalStorage, TuningStore, UiTuning, UI_TUNING_KEY};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_save_load_reset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");

    let mut store = TuningStore::open(&path);
    assert!(store.is_persistent());
    assert_eq!(store.load(), UiTuning::default());

    let mut tuning = store.load();
    tuning.set("PREVIEW_FPS", "48").unwrap();
    tuning.set("STATUS_POLL_MS", "1000").unwrap();
    store.save(&tuning).unwrap();

    let reopened = TuningStore::open(&path);
    assert_eq!(reopened.load().preview_fps, 48);
    assert_eq!(reopened.load().status_poll_ms, 1000);

    let mut reopened = reopened;
    assert_eq!(reopened.reset().unwrap(), UiTuning::default());
    assert_eq!(TuningStore::open(&path).load(), UiTuning::default());
}

#[test]
fn test_hand_edited_values_are_sanitized() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");

    let mut storage = LocalStorage::open(&path).unwrap();
    storage.set(
        UI_TUNING_KEY,
        json!({ "PARSE_LINES_PER_TICK": "9000", "PREVIEW_FPS": null }),
    );
    storage.set("other_key", json!(true));
    storage.flush().unwrap();

    let mut store = TuningStore::open(&path);
    let tuning = store.load();
    assert_eq!(tuning.parse_lines_per_tick, 5000);
    assert_eq!(tuning.preview_fps, 24);

    // Saving the tuning keeps unrelated keys
    store.save(&tuning).unwrap();
    let storage = LocalStorage::open(&path).unwrap();
    assert_eq!(storage.get("other_key"), Some(&json!(true)));
}
