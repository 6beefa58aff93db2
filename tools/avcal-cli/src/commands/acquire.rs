//! Open every non-excluded device and reconcile its settings.

use std::time::Duration;

use avcal_capture_engine::{AcquisitionReport, CalibrationFlow, FlowState};
use avcal_common::config::AppConfig;
use avcal_device_model::{ConstraintOutcome, MediaKind};
use serde::Serialize;

use super::new_flow;

/// Machine-readable result of an acquisition pass.
#[derive(Serialize)]
struct AcquireOutput<'a> {
    state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    report: Option<&'a AcquisitionReport>,
}

pub async fn run(config: &AppConfig, hold: Option<u64>, json: bool) -> anyhow::Result<()> {
    let mut flow = new_flow(config)?;

    let outcome = flow.run().await.map(|_| ());
    if json {
        let output = AcquireOutput {
            state: flow.state(),
            error: outcome.as_ref().err().map(ToString::to_string),
            report: flow.report(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    if let Err(e) = outcome {
        if !json {
            if let Some(report) = flow.report() {
                print_report(report);
            }
        }
        flow.shutdown();
        anyhow::bail!("{e}");
    }
    if !json {
        if let Some(report) = flow.report() {
            print_report(report);
        }
        print_selection(&flow).await;
    }

    if let Some(secs) = hold {
        let combined = flow.start()?;
        if !json {
            println!();
            println!("Holding streams for {secs}s (Ctrl+C to stop):");
            for track in combined.tracks() {
                println!("  {} track {} ({})", track.kind, track.id, track.label);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            res = tokio::signal::ctrl_c() => res?,
        }
        tracing::debug!(live = combined.is_live(), "Hold finished");
    }

    flow.shutdown();
    Ok(())
}

pub fn print_report(report: &AcquisitionReport) {
    println!(
        "Acquired {} camera(s) and {} microphone(s)",
        report.video_count, report.audio_count
    );

    for device in &report.acquired {
        let failed = device
            .constraints
            .iter()
            .filter(|r| matches!(r.outcome, ConstraintOutcome::Failed { .. }))
            .count();
        println!(
            "  [OK] {} {} ({}){}{}",
            device.kind,
            device.device_id,
            device.label,
            if device.defaults_written {
                ", defaults saved"
            } else {
                ""
            },
            if failed > 0 {
                format!(", {failed} setting(s) not applied")
            } else {
                String::new()
            }
        );
    }
    for device in &report.skipped {
        println!("  [SKIP] {} {}: {}", device.kind, device.device_id, device.reason);
    }
    for id in &report.excluded {
        println!("  [EXCLUDED] {id}");
    }
}

async fn print_selection(flow: &CalibrationFlow) {
    let registry = flow.registry();

    println!();
    if let Some(id) = registry.selected_id(MediaKind::Video) {
        println!("Selected camera: {id}");
        match flow.video_controls(id).await {
            Ok(controls) if controls.is_empty() => println!("  (no adjustable controls)"),
            Ok(controls) => {
                for control in controls {
                    println!(
                        "  {:<11} {:>5}  [{} .. {}, step {}]",
                        control.param.name(),
                        control.value,
                        control.range.min,
                        control.range.max,
                        control.range.step
                    );
                }
            }
            Err(e) => println!("  controls unavailable: {e}"),
        }
    }
    if let Some(id) = registry.selected_id(MediaKind::Audio) {
        let volume = flow
            .store()
            .load_audio(id)
            .map(|settings| settings.effective_volume())
            .unwrap_or_default();
        println!("Selected microphone: {id} (volume {volume})");
    }
}
