use avcal_device_model::{AudioSettings, ExclusionList, MediaKind, Resolution, VideoParam, VideoSettings};
use avcal_settings_store::{ConfigStore, KeyValueStore, MemoryStore, EXCLUSIONS_KEY};

#[test]
fn never_seen_device_is_absent_not_empty() {
    let handle = MemoryStore::new();
    handle.insert_raw("video.empty", "{}");
    let store = ConfigStore::new(handle);

    assert_eq!(store.load_video("unknown"), None);
    assert_eq!(store.load_video("empty"), Some(VideoSettings::default()));
}

#[test]
fn settings_are_namespaced_by_kind() {
    let handle = MemoryStore::new();
    let mut store = ConfigStore::new(handle.clone());

    let video = VideoSettings::default()
        .with(VideoParam::Brightness, 50)
        .with(VideoParam::Contrast, 25);
    store.save_video("dev-1", &video).unwrap();
    store.save_audio("dev-1", &AudioSettings::default()).unwrap();

    assert_eq!(
        handle.raw("video.dev-1").as_deref(),
        Some(r#"{"brightness":50,"contrast":25}"#)
    );
    assert_eq!(handle.raw("audio.dev-1").as_deref(), Some(r#"{"volume":50}"#));
    assert_eq!(store.load_video("dev-1"), Some(video));
    assert_eq!(store.load_audio("dev-1"), Some(AudioSettings::new(50)));
}

#[test]
fn corrupt_entries_read_as_absent() {
    let handle = MemoryStore::new();
    handle.insert_raw("video.cam", "{\"brightness\": ");
    handle.insert_raw("audio.mic", "[1, 2, 3]");
    handle.insert_raw(EXCLUSIONS_KEY, "\"not-an-array\"");
    let store = ConfigStore::new(handle);

    assert_eq!(store.load_video("cam"), None);
    assert_eq!(store.load_audio("mic"), None);
    assert!(store.load_exclusions().is_empty());
}

#[test]
fn out_of_range_volumes_are_not_corrupt() {
    let handle = MemoryStore::new();
    handle.insert_raw("audio.loud", r#"{"volume":300}"#);
    handle.insert_raw("audio.negative", r#"{"volume":-1}"#);
    handle.insert_raw("audio.float", r#"{"volume":75.0}"#);
    let store = ConfigStore::new(handle);

    let effective = |id: &str| store.load_audio(id).map(|s| s.effective_volume());
    assert_eq!(effective("loud"), Some(100));
    assert_eq!(effective("negative"), Some(0));
    assert_eq!(effective("float"), Some(75));
}

#[test]
fn exclusions_round_trip_as_json_array() {
    let handle = MemoryStore::new();
    let mut store = ConfigStore::new(handle.clone());

    let exclusions = ExclusionList::from_ids(["cam-9", "mic-3"]);
    store.save_exclusions(&exclusions).unwrap();

    assert_eq!(handle.raw(EXCLUSIONS_KEY).as_deref(), Some(r#"["cam-9","mic-3"]"#));
    assert_eq!(store.load_exclusions(), exclusions);
}

#[test]
fn forget_removes_both_kinds() {
    let handle = MemoryStore::new();
    let mut store = ConfigStore::new(handle.clone());
    store
        .save_video(
            "combo",
            &VideoSettings {
                resolution: Some(Resolution::HD),
                ..VideoSettings::default()
            },
        )
        .unwrap();
    store.save_audio("combo", &AudioSettings::new(10)).unwrap();

    assert_eq!(
        store.known_devices(),
        vec![
            (MediaKind::Audio, "combo".to_string()),
            (MediaKind::Video, "combo".to_string())
        ]
    );
    assert!(store.forget("combo").unwrap());
    assert!(!store.forget("combo").unwrap());
    assert!(handle.keys().is_empty());
}

#[test]
fn file_backed_config_store_persists_immediately() {
    let dir = std::env::temp_dir().join("avcal_test_config_store");
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("store.json");

    let mut store = ConfigStore::open(&path).unwrap();
    store
        .save_video("cam", &VideoSettings::default().with(VideoParam::Saturation, 7))
        .unwrap();

    // Read back through a second handle without dropping the first.
    let second = ConfigStore::open(&path).unwrap();
    assert_eq!(
        second.load_video("cam").and_then(|s| s.saturation),
        Some(7)
    );

    std::fs::remove_dir_all(&dir).ok();
}
