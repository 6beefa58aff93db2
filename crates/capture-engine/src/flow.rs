//! Calibration flow state machine.
//!
//! ```text
//! Init -> ProbingPermissions -> PermissionDenied
//!                            -> Enumerating -> NoDevices
//!                                           -> Ready -> Started
//! ```
//!
//! `retry` leaves `PermissionDenied`, `NoDevices` or `Ready` by tearing down
//! and running again. `shutdown` returns to `Init` from anywhere.

use std::sync::Arc;

use avcal_common::config::CaptureDefaults;
use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{
    AdjustableControl, ConstraintReport, EffectiveVideoConfig, MediaKind, Resolution,
    VideoCapabilities, VideoSettings,
};
use avcal_settings_store::ConfigStore;
use serde::Serialize;

use crate::acquisition::{AcquisitionEngine, AcquisitionReport};
use crate::backend::{CaptureBackend, CaptureStream};
use crate::probe;
use crate::reconciler::DeviceReconciler;
use crate::registry::{CombinedStream, SessionRegistry};

/// Where the flow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Init,
    ProbingPermissions,
    PermissionDenied,
    Enumerating,
    NoDevices,
    Ready,
    Started,
}

impl FlowState {
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            FlowState::PermissionDenied | FlowState::NoDevices | FlowState::Ready
        )
    }
}

/// Session context: engine, registry and reconciler behind one state.
pub struct CalibrationFlow {
    engine: AcquisitionEngine,
    registry: SessionRegistry,
    reconciler: DeviceReconciler,
    state: FlowState,
    report: Option<AcquisitionReport>,
}

impl CalibrationFlow {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        store: ConfigStore,
        defaults: CaptureDefaults,
    ) -> Self {
        let baseline = Resolution::new(defaults.video_width, defaults.video_height);
        Self {
            engine: AcquisitionEngine::new(backend, defaults),
            registry: SessionRegistry::new(),
            reconciler: DeviceReconciler::new(store, baseline),
            state: FlowState::Init,
            report: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn reconciler(&self) -> &DeviceReconciler {
        &self.reconciler
    }

    pub fn store(&self) -> &ConfigStore {
        self.reconciler.store()
    }

    /// Report of the last acquisition pass.
    pub fn report(&self) -> Option<&AcquisitionReport> {
        self.report.as_ref()
    }

    /// Check access, then acquire every non-excluded device.
    ///
    /// Ends in `Ready` with the first device of each kind selected, or fails
    /// with `PermissionDenied` / `NoDevicesFound`.
    pub async fn run(&mut self) -> AvcalResult<&AcquisitionReport> {
        if self.state != FlowState::Init {
            return Err(AvcalError::invalid_state(format!(
                "run() requires Init, flow is {:?}",
                self.state
            )));
        }

        self.transition(FlowState::ProbingPermissions);
        if let Err(e) = self.engine.request_access().await {
            self.transition(FlowState::PermissionDenied);
            return Err(match e {
                AvcalError::PermissionDenied { .. } => e,
                other => AvcalError::permission_denied(other.to_string()),
            });
        }

        self.transition(FlowState::Enumerating);
        let exclusions = self.reconciler.store().load_exclusions();
        let report = match self
            .engine
            .acquire(&exclusions, &mut self.registry, &mut self.reconciler)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.transition(FlowState::Init);
                return Err(e);
            }
        };

        let video_missing = report.video_count == 0;
        let audio_missing = report.audio_count == 0;
        let report = self.report.insert(report);

        if video_missing || audio_missing {
            self.state = FlowState::NoDevices;
            tracing::info!(video_missing, audio_missing, "Flow state -> NoDevices");
            return Err(AvcalError::no_devices(video_missing, audio_missing));
        }

        for kind in [MediaKind::Video, MediaKind::Audio] {
            if let Some(first) = self.registry.first_id(kind).map(str::to_string) {
                self.registry.select(kind, &first)?;
            }
        }
        self.state = FlowState::Ready;
        tracing::info!("Flow state -> Ready");
        Ok(report)
    }

    /// Tear down and run again.
    pub async fn retry(&mut self) -> AvcalResult<&AcquisitionReport> {
        if !self.state.can_retry() {
            return Err(AvcalError::invalid_state(format!(
                "retry() not allowed from {:?}",
                self.state
            )));
        }
        self.engine.teardown(&mut self.registry);
        self.report = None;
        self.transition(FlowState::Init);
        self.run().await
    }

    pub fn select_video(&mut self, device_id: &str) -> AvcalResult<()> {
        self.require_session()?;
        self.registry.select(MediaKind::Video, device_id)
    }

    pub fn select_audio(&mut self, device_id: &str) -> AvcalResult<()> {
        self.require_session()?;
        self.registry.select(MediaKind::Audio, device_id)
    }

    /// Live capability of a registered camera.
    pub async fn video_capabilities(&self, device_id: &str) -> AvcalResult<VideoCapabilities> {
        let stream = self.stream(MediaKind::Video, device_id)?;
        probe::probe_video(stream.as_ref()).await
    }

    /// Stored settings of a registered camera narrowed to what it supports.
    pub async fn effective_video(&self, device_id: &str) -> AvcalResult<EffectiveVideoConfig> {
        let capabilities = self.video_capabilities(device_id).await?;
        Ok(self.reconciler.effective_video(device_id, &capabilities))
    }

    /// Effective values paired with their ranges, one per adjustable control.
    pub async fn video_controls(&self, device_id: &str) -> AvcalResult<Vec<AdjustableControl>> {
        let capabilities = self.video_capabilities(device_id).await?;
        Ok(self
            .reconciler
            .effective_video(device_id, &capabilities)
            .controls(&capabilities))
    }

    /// Persist a user edit of a camera and apply it live.
    pub async fn update_video(
        &mut self,
        device_id: &str,
        update: &VideoSettings,
    ) -> AvcalResult<Vec<ConstraintReport>> {
        self.require_session()?;
        let stream = self.stream(MediaKind::Video, device_id)?;
        let capabilities = probe::probe_video(stream.as_ref()).await?;
        self.reconciler
            .apply_user_video_update(device_id, &capabilities, update, stream.as_ref())
            .await
    }

    /// Persist a microphone's monitor volume and apply it live.
    pub async fn set_volume(
        &mut self,
        device_id: &str,
        volume: u8,
    ) -> AvcalResult<Vec<ConstraintReport>> {
        self.require_session()?;
        let stream = self.stream(MediaKind::Audio, device_id)?;
        self.reconciler
            .set_volume(device_id, volume, stream.as_ref())
            .await
    }

    /// Hand off the selected camera and microphone.
    pub fn start(&mut self) -> AvcalResult<CombinedStream> {
        if self.state != FlowState::Ready {
            return Err(AvcalError::invalid_state(format!(
                "start() requires Ready, flow is {:?}",
                self.state
            )));
        }
        let combined = self
            .registry
            .combined_selection()
            .ok_or_else(|| AvcalError::invalid_state("No camera and microphone selected"))?;
        self.transition(FlowState::Started);
        Ok(combined)
    }

    /// Stop every stream and return to `Init`.
    pub fn shutdown(&mut self) {
        self.engine.teardown(&mut self.registry);
        self.report = None;
        self.transition(FlowState::Init);
    }

    fn require_session(&self) -> AvcalResult<()> {
        match self.state {
            FlowState::Ready | FlowState::Started => Ok(()),
            other => Err(AvcalError::invalid_state(format!(
                "No live session, flow is {other:?}"
            ))),
        }
    }

    fn stream(&self, kind: MediaKind, device_id: &str) -> AvcalResult<Arc<dyn CaptureStream>> {
        self.registry.stream(kind, device_id).ok_or_else(|| {
            AvcalError::invalid_state(format!("No live {kind} stream for {device_id}"))
        })
    }

    fn transition(&mut self, next: FlowState) {
        tracing::info!(from = ?self.state, to = ?next, "Flow state changed");
        self.state = next;
    }
}
