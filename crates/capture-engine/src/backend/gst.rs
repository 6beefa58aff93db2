//! GStreamer capture backend.
//!
//! Devices come from a `gst::DeviceMonitor`. Camera image controls go
//! straight to the V4L2 node behind the source; microphone volume is a
//! `volume` element in the monitor pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{
    Constraint, ConstraintReport, DeviceDescriptor, DeviceKind, MediaKind, OpenConstraints,
    ResolutionRange, VideoCapabilities, VideoParam,
};
use gst::prelude::*;
use gstreamer as gst;

use super::{CaptureBackend, CaptureStream, TrackInfo};
use crate::pipeline::{init_gstreamer, resolution_range, MonitorPipeline};

const DEVICE_CLASSES: [&str; 3] = ["Video/Source", "Audio/Source", "Audio/Sink"];

/// Device properties tried in order for a stable identifier.
const ID_PROPERTIES: [&str; 6] = [
    "device.path",
    "api.v4l2.path",
    "node.name",
    "device.string",
    "object.serial",
    "udev.id",
];

const V4L2_PATH_PROPERTIES: [&str; 2] = ["device.path", "api.v4l2.path"];

/// Backend over the host's GStreamer device providers.
pub struct GstBackend {
    devices: Mutex<HashMap<(DeviceKind, String), gst::Device>>,
    pipelines: AtomicUsize,
}

impl GstBackend {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            pipelines: AtomicUsize::new(0),
        }
    }

    fn devices(&self) -> MutexGuard<'_, HashMap<(DeviceKind, String), gst::Device>> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for GstBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for GstBackend {
    async fn request_access(&self) -> AvcalResult<()> {
        init_gstreamer()?;

        #[cfg(target_os = "linux")]
        {
            use avcal_platform_linux::permissions;

            let access = permissions::camera_access();
            if access.is_denied() {
                return Err(AvcalError::permission_denied(format!(
                    "{} camera node(s) present but none can be opened",
                    access.nodes.len()
                )));
            }
            if !permissions::audio_server_available() {
                tracing::warn!("No PipeWire or PulseAudio socket found; microphones may be missing");
            }
            tracing::debug!(
                nodes = access.nodes.len(),
                readable = access.readable.len(),
                "Camera access checked"
            );
        }

        Ok(())
    }

    async fn enumerate(&self) -> AvcalResult<Vec<DeviceDescriptor>> {
        init_gstreamer()?;

        let monitor = gst::DeviceMonitor::new();
        for class in DEVICE_CLASSES {
            if monitor.add_filter(Some(class), None).is_none() {
                tracing::warn!(class, "Device monitor rejected filter");
            }
        }
        monitor
            .start()
            .map_err(|e| AvcalError::capture(format!("Failed to start device monitor: {e}")))?;
        let found = monitor.devices();
        monitor.stop();

        let mut devices = self.devices();
        devices.clear();

        let mut descriptors = Vec::new();
        for device in found {
            let class = device.device_class();
            let Some(kind) = device_kind(&class) else {
                tracing::debug!(class = %class, name = %device.display_name(), "Skipping device of unknown class");
                continue;
            };
            let id = device_id(&device);
            if devices.contains_key(&(kind, id.clone())) {
                tracing::debug!(device_id = %id, ?kind, "Skipping duplicate device");
                continue;
            }
            descriptors.push(DeviceDescriptor::new(
                id.clone(),
                kind,
                device.display_name().as_str(),
            ));
            devices.insert((kind, id), device);
        }

        tracing::info!(count = descriptors.len(), "Devices enumerated");
        Ok(descriptors)
    }

    async fn open_stream(
        &self,
        device: &DeviceDescriptor,
        constraints: &OpenConstraints,
    ) -> AvcalResult<Arc<dyn CaptureStream>> {
        let kind = device.media_kind().ok_or_else(|| {
            AvcalError::unsupported(format!("{} is not a capture device", device.id))
        })?;
        let gst_device = self
            .devices()
            .get(&(device.kind, device.id.clone()))
            .cloned()
            .ok_or_else(|| {
                AvcalError::device_unavailable(format!("{} is no longer present", device.id))
            })?;

        let source = gst_device.create_element(None).map_err(|e| {
            AvcalError::device_unavailable(format!("Cannot create source for {}: {e}", device.id))
        })?;

        let (control_node, resolution) = match kind {
            MediaKind::Video => (
                v4l2_path(&gst_device),
                gst_device.caps().as_ref().and_then(|caps| resolution_range(caps)),
            ),
            MediaKind::Audio => (None, None),
        };

        let serial = self.pipelines.fetch_add(1, Ordering::SeqCst);
        let pipeline = MonitorPipeline::build(format!("avcal-{kind}-{serial}"), source, constraints)?;
        let pipeline = tokio::task::spawn_blocking(move || pipeline.start().map(|()| pipeline))
            .await
            .map_err(|e| AvcalError::capture(format!("Pipeline start task failed: {e}")))??;

        tracing::info!(
            device_id = %device.id,
            %kind,
            pipeline = pipeline.name(),
            control_node = ?control_node,
            "Stream opened"
        );

        Ok(Arc::new(GstStream {
            device_id: device.id.clone(),
            label: device.display_label().to_string(),
            kind,
            pipeline,
            control_node,
            resolution,
        }))
    }
}

/// A device held open by a [`MonitorPipeline`].
struct GstStream {
    device_id: String,
    label: String,
    kind: MediaKind,
    pipeline: MonitorPipeline,
    control_node: Option<PathBuf>,
    resolution: Option<ResolutionRange>,
}

#[async_trait::async_trait]
impl CaptureStream for GstStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: format!("{}:{}", self.kind, self.device_id),
            kind: self.kind,
            label: self.label.clone(),
        }]
    }

    async fn video_capabilities(&self) -> AvcalResult<VideoCapabilities> {
        if self.kind != MediaKind::Video {
            return Err(AvcalError::unsupported("audio streams have no image controls"));
        }
        let Some(node) = &self.control_node else {
            return Err(AvcalError::unsupported(format!(
                "{} has no V4L2 node",
                self.device_id
            )));
        };

        let mut capabilities = query_controls(node)?;
        capabilities.resolution = self.resolution;
        Ok(capabilities)
    }

    async fn apply_constraints(&self, constraints: &[Constraint]) -> Vec<ConstraintReport> {
        let capabilities = self.video_capabilities().await;

        let mut reports = Vec::with_capacity(constraints.len());
        for constraint in constraints {
            let report = match *constraint {
                Constraint::Volume { value } => match self.pipeline.set_volume(value) {
                    Ok(()) => ConstraintReport::applied(*constraint),
                    Err(AvcalError::Unsupported { .. }) => ConstraintReport::unsupported(*constraint),
                    Err(e) => ConstraintReport::failed(*constraint, e.to_string()),
                },
                Constraint::Video { param, value } => {
                    let blocked = blocked_video_constraint(*constraint, param, &capabilities);
                    match (blocked, self.control_node.as_deref()) {
                        (Some(report), _) => report,
                        (None, None) => ConstraintReport::unsupported(*constraint),
                        (None, Some(node)) => match write_control(node, param, value) {
                            Ok(actual) => {
                                tracing::debug!(device_id = %self.device_id, %param, requested = value, actual, "Control set");
                                ConstraintReport::applied(*constraint)
                            }
                            Err(e) => ConstraintReport::failed(*constraint, e.to_string()),
                        },
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    fn stop(&self) {
        if let Err(e) = self.pipeline.stop() {
            tracing::warn!(device_id = %self.device_id, error = %e, "Failed to stop stream");
        }
    }

    fn is_live(&self) -> bool {
        self.pipeline.is_running()
    }
}

fn device_kind(class: &str) -> Option<DeviceKind> {
    if class.contains("Video/Source") {
        Some(DeviceKind::VideoInput)
    } else if class.contains("Audio/Source") {
        Some(DeviceKind::AudioInput)
    } else if class.contains("Audio/Sink") {
        Some(DeviceKind::AudioOutput)
    } else {
        None
    }
}

fn device_id(device: &gst::Device) -> String {
    device
        .properties()
        .and_then(|props| {
            ID_PROPERTIES
                .iter()
                .find_map(|key| props.get::<String>(*key).ok())
        })
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| device.display_name().to_string())
}

fn v4l2_path(device: &gst::Device) -> Option<PathBuf> {
    let props = device.properties()?;
    V4L2_PATH_PROPERTIES
        .iter()
        .filter_map(|key| props.get::<String>(*key).ok())
        .find(|path| path.starts_with("/dev/video"))
        .map(PathBuf::from)
}

/// Report for a video constraint that cannot be written, or `None` when
/// the control is available. A failed query is kept apart from a control
/// the camera lacks.
fn blocked_video_constraint(
    constraint: Constraint,
    param: VideoParam,
    capabilities: &AvcalResult<VideoCapabilities>,
) -> Option<ConstraintReport> {
    match capabilities {
        Ok(caps) if caps.supports(param) => None,
        Ok(_) | Err(AvcalError::Unsupported { .. }) => Some(ConstraintReport::unsupported(constraint)),
        Err(e) => Some(ConstraintReport::failed(constraint, e.to_string())),
    }
}

/// A control node the user cannot open, or that is gone, leaves the camera
/// without image controls. Anything else is a device fault.
#[cfg(any(target_os = "linux", test))]
fn control_query_error(node: &Path, error: std::io::Error) -> AvcalError {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
            AvcalError::unsupported(format!("Cannot open {}: {error}", node.display()))
        }
        _ => AvcalError::device_unavailable(format!("Cannot query {}: {error}", node.display())),
    }
}

#[cfg(target_os = "linux")]
fn query_controls(node: &Path) -> AvcalResult<VideoCapabilities> {
    avcal_platform_linux::v4l2::query_video_capabilities(node)
        .map_err(|e| control_query_error(node, e))
}

#[cfg(not(target_os = "linux"))]
fn query_controls(node: &Path) -> AvcalResult<VideoCapabilities> {
    Err(AvcalError::unsupported(format!(
        "image controls on {} need V4L2",
        node.display()
    )))
}

#[cfg(target_os = "linux")]
fn write_control(node: &Path, param: VideoParam, value: i32) -> std::io::Result<i32> {
    use avcal_platform_linux::v4l2;

    let file = v4l2::open_device(node)?;
    v4l2::set_control(&file, v4l2::control_id(param), value)
}

#[cfg(not(target_os = "linux"))]
fn write_control(_node: &Path, param: VideoParam, _value: i32) -> std::io::Result<i32> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("{param} needs V4L2"),
    ))
}
