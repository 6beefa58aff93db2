//! List devices the platform exposes.

use avcal_capture_engine::default_backend;
use avcal_common::config::AppConfig;
use avcal_device_model::{is_pseudo_device, DeviceKind};

use super::open_store;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let backend = default_backend();
    if let Err(e) = backend.request_access().await {
        println!("[WARN] {e}");
        println!();
    }

    let devices = backend
        .enumerate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to enumerate devices: {e}"))?;
    let store = open_store(config)?;
    let exclusions = store.load_exclusions();

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    for kind in [DeviceKind::VideoInput, DeviceKind::AudioInput, DeviceKind::AudioOutput] {
        let of_kind: Vec<_> = devices.iter().filter(|d| d.kind == kind).collect();
        if of_kind.is_empty() {
            continue;
        }

        println!(
            "{}:",
            match kind {
                DeviceKind::VideoInput => "Cameras",
                DeviceKind::AudioInput => "Microphones",
                DeviceKind::AudioOutput => "Outputs (never captured)",
            }
        );
        for device in of_kind {
            let marker = if is_pseudo_device(&device.id) {
                " [implicit]"
            } else if exclusions.contains(&device.id) {
                " [excluded]"
            } else {
                ""
            };
            let stored = match kind {
                DeviceKind::VideoInput => store.load_video(&device.id).is_some(),
                DeviceKind::AudioInput => store.load_audio(&device.id).is_some(),
                DeviceKind::AudioOutput => false,
            };
            println!(
                "  {}  {}{}{}",
                device.id,
                device.display_label(),
                marker,
                if stored { " (calibrated)" } else { "" }
            );
        }
        println!();
    }

    let offline: Vec<_> = store
        .known_devices()
        .into_iter()
        .filter(|(_, id)| !devices.iter().any(|device| device.id == *id))
        .collect();
    if !offline.is_empty() {
        println!("Calibrated but not connected:");
        for (kind, id) in offline {
            println!("  {id}  ({kind})");
        }
    }

    Ok(())
}
