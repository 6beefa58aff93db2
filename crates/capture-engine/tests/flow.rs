mod support;

use avcal_capture_engine::{CalibrationFlow, FlowState};
use avcal_common::config::CaptureDefaults;
use avcal_common::error::AvcalError;
use avcal_device_model::{
    Constraint, ConstraintOutcome, ExclusionList, MediaKind, VideoParam, VideoSettings,
};
use avcal_settings_store::{ConfigStore, MemoryStore, EXCLUSIONS_KEY};

use support::{brightness_contrast, FakeBackend};

fn flow(backend: &FakeBackend, store: &MemoryStore) -> CalibrationFlow {
    CalibrationFlow::new(
        backend.boxed(),
        ConfigStore::new(store.clone()),
        CaptureDefaults::default(),
    )
}

fn two_cameras_one_mic() -> FakeBackend {
    FakeBackend::new()
        .with_camera("cam0", brightness_contrast())
        .with_camera("cam1", brightness_contrast())
        .with_microphone("mic0")
}

#[tokio::test]
async fn run_selects_first_device_of_each_kind() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);

    let report = flow.run().await.unwrap();
    assert_eq!((report.video_count, report.audio_count), (2, 1));

    assert_eq!(flow.state(), FlowState::Ready);
    assert_eq!(flow.registry().selected_id(MediaKind::Video), Some("cam0"));
    assert_eq!(flow.registry().selected_id(MediaKind::Audio), Some("mic0"));
    assert_eq!(
        flow.registry().selected_video_track().map(|track| track.id),
        Some("cam0-track".to_string())
    );
}

#[tokio::test]
async fn denied_access_stops_before_enumeration() {
    let backend = two_cameras_one_mic().deny_access();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);

    let err = flow.run().await.unwrap_err();
    assert!(matches!(err, AvcalError::PermissionDenied { .. }));
    assert!(err.is_fatal());
    assert_eq!(flow.state(), FlowState::PermissionDenied);
    assert!(backend.opened().is_empty());

    backend.set_access_denied(false);
    flow.retry().await.unwrap();
    assert_eq!(flow.state(), FlowState::Ready);
}

#[tokio::test]
async fn missing_kinds_have_distinct_messages() {
    let store = MemoryStore::new();

    let mut only_audio = flow(&FakeBackend::new().with_microphone("mic0"), &store);
    let err = only_audio.run().await.unwrap_err();
    assert_eq!(only_audio.state(), FlowState::NoDevices);
    assert!(err.to_string().contains("No video input device"));

    let mut nothing = flow(&FakeBackend::new().with_output("speakers"), &store);
    let err = nothing.run().await.unwrap_err();
    assert!(matches!(
        err,
        AvcalError::NoDevicesFound {
            video_missing: true,
            audio_missing: true
        }
    ));
    assert!(err.to_string().contains("No video or audio input device"));
}

#[tokio::test]
async fn excluding_the_only_microphone_reports_no_audio() {
    let backend = FakeBackend::new()
        .with_camera("cam0", brightness_contrast())
        .with_microphone("mic0");
    let store = MemoryStore::new();
    store.insert_raw(
        EXCLUSIONS_KEY,
        serde_json::to_string(&ExclusionList::from_ids(["mic0"])).unwrap(),
    );
    let mut flow = flow(&backend, &store);

    let err = flow.run().await.unwrap_err();

    assert!(err.to_string().contains("No audio input device"));
    let report = flow.report().unwrap();
    assert_eq!((report.video_count, report.audio_count), (1, 0));
    assert_eq!(flow.state(), FlowState::NoDevices);
}

#[tokio::test]
async fn retry_after_no_devices_rescans() {
    let backend = FakeBackend::new().with_camera("cam0", brightness_contrast());
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap_err();

    let backend_with_mic = backend.clone().with_microphone("mic0");
    let report = flow.retry().await.unwrap();

    assert_eq!(report.audio_count, 1);
    assert_eq!(flow.state(), FlowState::Ready);
    assert!(!backend_with_mic.opened()[0].is_live_now());
}

#[tokio::test]
async fn user_update_replaces_stored_settings() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    let update = VideoSettings::default().with(VideoParam::Brightness, 80);
    let reports = flow.update_video("cam0", &update).await.unwrap();

    assert_eq!(store.raw("video.cam0").as_deref(), Some(r#"{"brightness":80}"#));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, ConstraintOutcome::Applied);
    assert_eq!(
        backend.stream("cam0").applied().last(),
        Some(&Constraint::Video {
            param: VideoParam::Brightness,
            value: 80
        })
    );
    assert_eq!(
        store.raw("video.cam1").as_deref(),
        Some(r#"{"brightness":50,"contrast":25}"#)
    );
}

#[tokio::test]
async fn unsupported_update_keys_are_stored_but_not_applied() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    let update = VideoSettings::default()
        .with(VideoParam::Contrast, 10)
        .with(VideoParam::Saturation, 40);
    let reports = flow.update_video("cam0", &update).await.unwrap();

    assert_eq!(
        store.raw("video.cam0").as_deref(),
        Some(r#"{"contrast":10,"saturation":40}"#)
    );
    assert_eq!(reports.len(), 1);

    let effective = flow.effective_video("cam0").await.unwrap();
    assert_eq!(effective.get(VideoParam::Contrast), Some(10));
    assert_eq!(effective.get(VideoParam::Saturation), None);
}

#[tokio::test]
async fn controls_pair_values_with_ranges() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    let controls = flow.video_controls("cam1").await.unwrap();

    let summary: Vec<(VideoParam, i32, f64)> = controls
        .iter()
        .map(|control| (control.param, control.value, control.range.max))
        .collect();
    assert_eq!(
        summary,
        vec![
            (VideoParam::Brightness, 50, 100.0),
            (VideoParam::Contrast, 25, 50.0)
        ]
    );
}

#[tokio::test]
async fn volume_is_clamped_persisted_and_applied() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    flow.set_volume("mic0", 30).await.unwrap();
    assert_eq!(store.raw("audio.mic0").as_deref(), Some(r#"{"volume":30}"#));

    flow.set_volume("mic0", 140).await.unwrap();
    assert_eq!(store.raw("audio.mic0").as_deref(), Some(r#"{"volume":100}"#));
    assert_eq!(
        backend.stream("mic0").applied(),
        vec![
            Constraint::Volume { value: 50 },
            Constraint::Volume { value: 30 },
            Constraint::Volume { value: 100 },
        ]
    );
}

#[tokio::test]
async fn selection_rejects_unknown_devices() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    flow.select_video("cam1").unwrap();
    assert_eq!(flow.registry().selected_id(MediaKind::Video), Some("cam1"));

    assert!(flow.select_video("mic0").is_err());
    assert!(flow.select_audio("nope").is_err());
    assert_eq!(flow.registry().selected_id(MediaKind::Audio), Some("mic0"));
}

#[tokio::test]
async fn start_hands_off_combined_selection() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();
    flow.select_video("cam1").unwrap();

    let combined = flow.start().unwrap();

    assert_eq!(flow.state(), FlowState::Started);
    let kinds: Vec<MediaKind> = combined.tracks().iter().map(|track| track.kind).collect();
    assert_eq!(kinds, vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(combined.video.device_id(), "cam1");
    assert!(combined.is_live());
    assert!(flow.start().is_err());
}

#[tokio::test]
async fn shutdown_releases_everything() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    flow.shutdown();

    assert_eq!(flow.state(), FlowState::Init);
    assert!(flow.registry().is_empty());
    assert!(backend.opened().iter().all(|stream| !stream.is_live_now()));
    assert!(flow.update_video("cam0", &VideoSettings::default()).await.is_err());
}

#[tokio::test]
async fn run_is_only_valid_from_init() {
    let backend = two_cameras_one_mic();
    let store = MemoryStore::new();
    let mut flow = flow(&backend, &store);
    flow.run().await.unwrap();

    let err = flow.run().await.unwrap_err();
    assert!(matches!(err, AvcalError::InvalidState { .. }));
    assert_eq!(flow.state(), FlowState::Ready);
}
