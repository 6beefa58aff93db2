//! Capability probing of live streams.

use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{AudioCapabilities, DeviceCapabilities, MediaKind, VideoCapabilities};

use crate::backend::CaptureStream;

/// Tunable parameters of a live stream, by stream kind.
pub async fn probe(stream: &dyn CaptureStream) -> AvcalResult<DeviceCapabilities> {
    match stream.kind() {
        MediaKind::Video => probe_video(stream).await.map(DeviceCapabilities::Video),
        MediaKind::Audio => Ok(DeviceCapabilities::Audio(probe_audio())),
    }
}

/// Image controls of a camera stream.
///
/// A stream that cannot be queried yields no capabilities. Any other error
/// is returned to the caller.
pub async fn probe_video(stream: &dyn CaptureStream) -> AvcalResult<VideoCapabilities> {
    match stream.video_capabilities().await {
        Ok(capabilities) => {
            tracing::debug!(
                device_id = stream.device_id(),
                brightness = capabilities.brightness.is_some(),
                contrast = capabilities.contrast.is_some(),
                saturation = capabilities.saturation.is_some(),
                resolution = capabilities.resolution.is_some(),
                "Video capabilities probed"
            );
            Ok(capabilities)
        }
        Err(AvcalError::Unsupported { message }) => {
            tracing::debug!(
                device_id = stream.device_id(),
                reason = %message,
                "Capability query unsupported; no adjustable controls"
            );
            Ok(VideoCapabilities::none())
        }
        Err(e) => Err(e),
    }
}

/// Microphones have no hardware query; the monitor volume is always
/// available.
pub fn probe_audio() -> AudioCapabilities {
    AudioCapabilities::default()
}
