//! Unit tests for the local stores

use batch_image_studio::storage::{
    CredentialStore, FileStore, KeyValueStore, MemoryStore, PresetFields, PresetStore, Theme,
    ThemeStore, PRESETS_STORAGE_KEY,
};
use std::sync::Arc;

fn fields(master: &str, suffix: &str, negative: &str) -> PresetFields {
    PresetFields {
        master_prompts: master.to_string(),
        suffix: suffix.to_string(),
        negative_prompts: negative.to_string(),
    }
}

#[test]
fn test_file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let first: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&path));
    CredentialStore::new(first.clone()).set("AIza-secret").unwrap();
    ThemeStore::new(first.clone()).set(Theme::Dark).unwrap();
    PresetStore::new(first)
        .save("portrait", &fields("studio light", ", 85mm", "blurry"))
        .unwrap();

    let second: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&path));
    assert_eq!(
        CredentialStore::new(second.clone()).get().unwrap().as_deref(),
        Some("AIza-secret")
    );
    assert_eq!(ThemeStore::new(second.clone()).get(), Theme::Dark);
    let presets = PresetStore::new(second).list();
    assert_eq!(presets.len(), 1);
    assert_eq!(presets[0].fields.suffix, ", 85mm");
}

#[test]
fn test_corrupt_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{not json").unwrap();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&path));
    assert!(store.get("theme").unwrap().is_none());
    assert!(PresetStore::new(store.clone()).list().is_empty());

    store.set("theme", "dark").unwrap();
    assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
}

#[test]
fn test_corrupt_preset_value_lists_as_empty() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store.set(PRESETS_STORAGE_KEY, "[[[").unwrap();

    assert!(PresetStore::new(store).list().is_empty());
}

#[test]
fn test_preset_overwrite_keeps_size() {
    let presets = PresetStore::new(Arc::new(MemoryStore::new()));
    assert!(presets.save("a", &fields("one", "", "")).unwrap());
    assert!(presets.save("b", &fields("two", "", "")).unwrap());
    assert!(presets.save("a", &fields("three", " hdr ", "")).unwrap());

    let list = presets.list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].name, "a");
    assert_eq!(list[0].fields.master_prompts, "three");
    assert_eq!(list[0].fields.suffix, "hdr");
}

#[test]
fn test_preset_blank_name_rejected() {
    let presets = PresetStore::new(Arc::new(MemoryStore::new()));
    assert!(!presets.save("   ", &fields("x", "", "")).unwrap());
    assert!(presets.list().is_empty());
}

#[test]
fn test_preset_save_then_get() {
    let presets = PresetStore::new(Arc::new(MemoryStore::new()));
    let saved = fields("cinematic", ", golden hour", "text, watermark");
    presets.save("film", &saved).unwrap();

    assert_eq!(presets.get("film").unwrap().fields, saved);
    assert!(presets.get("Film").is_none());

    presets.delete("film").unwrap();
    presets.delete("film").unwrap();
    assert!(presets.list().is_empty());
}

#[test]
fn test_presets_use_documented_layout() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    PresetStore::new(store.clone())
        .save("p", &fields("m", "s", "n"))
        .unwrap();

    let raw = store.get(PRESETS_STORAGE_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["presets"][0]["name"], "p");
    assert_eq!(value["presets"][0]["negative_prompts"], "n");
}
