use std::sync::Arc;

use avcal_common::error::AvcalResult;
use avcal_device_model::{
    Constraint, ConstraintReport, DeviceDescriptor, MediaKind, OpenConstraints, VideoCapabilities,
};
use serde::{Deserialize, Serialize};

pub mod gst;

pub use self::gst::GstBackend;

/// One media track carried by a capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: MediaKind,
    pub label: String,
}

/// Abstract interface to the platform capture subsystem.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Ask for camera and microphone access.
    ///
    /// Fails with `PermissionDenied` when the user cannot capture at all.
    async fn request_access(&self) -> AvcalResult<()>;

    /// List every device the platform exposes, in platform order.
    async fn enumerate(&self) -> AvcalResult<Vec<DeviceDescriptor>>;

    /// Open a live stream pinned to `device`.
    ///
    /// Fails with `PermissionDenied`, `DeviceUnavailable` or
    /// `Overconstrained`. Never substitutes another device.
    async fn open_stream(
        &self,
        device: &DeviceDescriptor,
        constraints: &OpenConstraints,
    ) -> AvcalResult<Arc<dyn CaptureStream>>;
}

/// A live capture stream from a single device.
#[async_trait::async_trait]
pub trait CaptureStream: Send + Sync {
    fn device_id(&self) -> &str;

    fn kind(&self) -> MediaKind;

    fn tracks(&self) -> Vec<TrackInfo>;

    /// Tunable image parameters of the device.
    ///
    /// Returns `Unsupported` when the stream cannot be queried.
    async fn video_capabilities(&self) -> AvcalResult<VideoCapabilities>;

    /// Apply soft constraints. Each one is attempted independently.
    async fn apply_constraints(&self, constraints: &[Constraint]) -> Vec<ConstraintReport>;

    /// Stop every track. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Get the platform capture backend.
pub fn default_backend() -> Box<dyn CaptureBackend> {
    Box::new(GstBackend::new())
}
