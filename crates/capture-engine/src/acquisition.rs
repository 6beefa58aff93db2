//! Device acquisition: enumerate, filter, open, probe, reconcile, register.

use std::sync::Arc;

use avcal_common::config::CaptureDefaults;
use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{
    ApplySummary, ConstraintOutcome, ConstraintReport, DeviceCapabilities, DeviceDescriptor,
    ExclusionList, MediaKind, OpenConstraints,
};
use serde::Serialize;

use crate::backend::{CaptureBackend, CaptureStream};
use crate::probe;
use crate::reconciler::DeviceReconciler;
use crate::registry::SessionRegistry;

/// A device that was opened and reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquiredDevice {
    pub device_id: String,
    pub kind: MediaKind,
    pub label: String,
    pub defaults_written: bool,
    /// Soft constraints applied after reconciliation.
    pub constraints: Vec<ConstraintReport>,
}

/// A capture device that could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDevice {
    pub device_id: String,
    pub kind: MediaKind,
    pub reason: String,
}

/// Result of one acquisition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionReport {
    pub video_count: usize,
    pub audio_count: usize,
    /// Ids hidden by the exclusion list, in enumeration order.
    pub excluded: Vec<String>,
    pub skipped: Vec<SkippedDevice>,
    pub acquired: Vec<AcquiredDevice>,
}

impl AcquisitionReport {
    pub fn count(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Video => self.video_count,
            MediaKind::Audio => self.audio_count,
        }
    }
}

/// Owns the capture backend and every stream it opened.
pub struct AcquisitionEngine {
    backend: Box<dyn CaptureBackend>,
    defaults: CaptureDefaults,
    streams: Vec<Arc<dyn CaptureStream>>,
}

impl AcquisitionEngine {
    pub fn new(backend: Box<dyn CaptureBackend>, defaults: CaptureDefaults) -> Self {
        Self {
            backend,
            defaults,
            streams: Vec::new(),
        }
    }

    /// Streams currently held open.
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    pub async fn request_access(&self) -> AvcalResult<()> {
        self.backend.request_access().await
    }

    /// Capture-capable devices that survive the exclusion filter, plus the
    /// ids that were excluded.
    pub async fn candidates(
        &self,
        exclusions: &ExclusionList,
    ) -> AvcalResult<(Vec<DeviceDescriptor>, Vec<String>)> {
        let devices = self.backend.enumerate().await?;
        let mut candidates = Vec::new();
        let mut excluded = Vec::new();

        for device in devices {
            if device.media_kind().is_none() {
                continue;
            }
            if exclusions.contains(&device.id) {
                tracing::debug!(device_id = %device.id, "Device excluded");
                excluded.push(device.id);
                continue;
            }
            candidates.push(device);
        }
        Ok((candidates, excluded))
    }

    /// Open and reconcile every candidate device in enumeration order.
    ///
    /// A device that fails is logged and skipped; the pass continues. Any
    /// streams from a previous pass are torn down first.
    pub async fn acquire(
        &mut self,
        exclusions: &ExclusionList,
        registry: &mut SessionRegistry,
        reconciler: &mut DeviceReconciler,
    ) -> AvcalResult<AcquisitionReport> {
        self.teardown(registry);

        let (candidates, excluded) = self.candidates(exclusions).await?;
        let mut report = AcquisitionReport {
            excluded,
            ..AcquisitionReport::default()
        };

        for device in &candidates {
            let Some(kind) = device.media_kind() else {
                continue;
            };
            match self.acquire_one(device, kind, reconciler).await {
                Ok((stream, acquired)) => {
                    registry.register(&stream);
                    self.streams.push(stream);
                    match kind {
                        MediaKind::Video => report.video_count += 1,
                        MediaKind::Audio => report.audio_count += 1,
                    }
                    report.acquired.push(acquired);
                }
                Err(e) => {
                    let err = AvcalError::device_acquisition(&device.id, e.to_string());
                    tracing::warn!(device_id = %device.id, %kind, error = %err, "Skipping device");
                    report.skipped.push(SkippedDevice {
                        device_id: device.id.clone(),
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            video = report.video_count,
            audio = report.audio_count,
            excluded = report.excluded.len(),
            skipped = report.skipped.len(),
            "Acquisition finished"
        );
        Ok(report)
    }

    async fn acquire_one(
        &self,
        device: &DeviceDescriptor,
        kind: MediaKind,
        reconciler: &mut DeviceReconciler,
    ) -> AvcalResult<(Arc<dyn CaptureStream>, AcquiredDevice)> {
        let constraints = self.open_constraints(device, kind, reconciler);
        let stream = self.backend.open_stream(device, &constraints).await?;

        match Self::reconcile(device, kind, stream.as_ref(), reconciler).await {
            Ok(acquired) => Ok((stream, acquired)),
            Err(e) => {
                stream.stop();
                Err(e)
            }
        }
    }

    async fn reconcile(
        device: &DeviceDescriptor,
        kind: MediaKind,
        stream: &dyn CaptureStream,
        reconciler: &mut DeviceReconciler,
    ) -> AvcalResult<AcquiredDevice> {
        let (constraints, defaults_written) = match probe::probe(stream).await? {
            DeviceCapabilities::Video(capabilities) => {
                let outcome = reconciler.reconcile_video(&device.id, &capabilities)?;
                (outcome.effective.constraints(), outcome.defaults_written)
            }
            DeviceCapabilities::Audio(_) => {
                let outcome = reconciler.reconcile_audio(&device.id)?;
                (outcome.effective.constraints(), outcome.defaults_written)
            }
        };

        let reports = if constraints.is_empty() {
            Vec::new()
        } else {
            stream.apply_constraints(&constraints).await
        };
        log_constraint_reports(&device.id, &reports);

        Ok(AcquiredDevice {
            device_id: device.id.clone(),
            kind,
            label: device.display_label().to_string(),
            defaults_written,
            constraints: reports,
        })
    }

    fn open_constraints(
        &self,
        device: &DeviceDescriptor,
        kind: MediaKind,
        reconciler: &DeviceReconciler,
    ) -> OpenConstraints {
        match kind {
            MediaKind::Video => OpenConstraints::video(
                &device.id,
                reconciler.open_resolution(&device.id),
                self.defaults.frame_rate,
            ),
            MediaKind::Audio => OpenConstraints::audio(
                &device.id,
                self.defaults.audio_channels,
                self.defaults.audio_sample_rate,
                self.defaults.audio_processing,
            ),
        }
    }

    /// Stop every open stream and clear the registry.
    pub fn teardown(&mut self, registry: &mut SessionRegistry) {
        if !self.streams.is_empty() {
            tracing::debug!(streams = self.streams.len(), "Tearing down streams");
        }
        for stream in self.streams.drain(..) {
            stream.stop();
        }
        registry.clear();
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        for stream in self.streams.drain(..) {
            stream.stop();
        }
    }
}

fn log_constraint_reports(device_id: &str, reports: &[ConstraintReport]) {
    for report in reports {
        if let ConstraintOutcome::Failed { reason } = &report.outcome {
            tracing::warn!(device_id, constraint = %report.constraint, reason = %reason, "Constraint not applied");
        }
    }
    let summary = ApplySummary::of(reports);
    tracing::debug!(
        device_id,
        applied = summary.applied,
        skipped = summary.skipped,
        failed = summary.failed,
        "Soft constraints applied"
    );
}
