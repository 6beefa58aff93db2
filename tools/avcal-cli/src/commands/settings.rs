//! Stored settings: show, edit through a live session, reset.

use avcal_capture_engine::CalibrationFlow;
use avcal_common::config::AppConfig;
use avcal_device_model::{ConstraintOutcome, ConstraintReport, VideoParam, VideoSettings};

use super::{new_flow, open_store};

pub fn show(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match store.load_video(id) {
        Some(settings) => println!("video: {}", serde_json::to_string(&settings)?),
        None => println!("video: (never configured)"),
    }
    match store.load_audio(id) {
        Some(settings) => println!("audio: {}", serde_json::to_string(&settings)?),
        None => println!("audio: (never configured)"),
    }
    if store.load_exclusions().contains(id) {
        println!("excluded: yes");
    }
    Ok(())
}

pub async fn set_video(
    config: &AppConfig,
    id: &str,
    brightness: Option<i32>,
    contrast: Option<i32>,
    saturation: Option<i32>,
) -> anyhow::Result<()> {
    let mut update = VideoSettings::default();
    update.set(VideoParam::Brightness, brightness);
    update.set(VideoParam::Contrast, contrast);
    update.set(VideoParam::Saturation, saturation);

    let mut flow = live_flow(config).await?;
    let result = flow.update_video(id, &update).await;
    flow.shutdown();

    print_reports(&result?);
    Ok(())
}

pub async fn set_volume(config: &AppConfig, id: &str, volume: u8) -> anyhow::Result<()> {
    let mut flow = live_flow(config).await?;
    let result = flow.set_volume(id, volume).await;
    flow.shutdown();

    print_reports(&result?);
    Ok(())
}

pub fn reset(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    if store.forget(id)? {
        println!("Forgot stored settings of {id}.");
    } else {
        println!("{id} has no stored settings.");
    }
    Ok(())
}

async fn live_flow(config: &AppConfig) -> anyhow::Result<CalibrationFlow> {
    let mut flow = new_flow(config)?;
    let outcome = flow.run().await.map(|_| ());
    if let Err(e) = outcome {
        flow.shutdown();
        anyhow::bail!("{e}");
    }
    Ok(flow)
}

fn print_reports(reports: &[ConstraintReport]) {
    if reports.is_empty() {
        println!("Saved. Nothing to apply.");
        return;
    }
    println!("Saved.");
    for report in reports {
        match &report.outcome {
            ConstraintOutcome::Applied => println!("  [OK] {}", report.constraint),
            ConstraintOutcome::SkippedUnsupported => {
                println!("  [SKIP] {} (not supported)", report.constraint)
            }
            ConstraintOutcome::Failed { reason } => {
                println!("  [FAIL] {}: {reason}", report.constraint)
            }
        }
    }
}
