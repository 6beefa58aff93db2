//! avcal Linux Platform Integration
//!
//! Platform-specific pieces used by the capture engine on Linux:
//! - **V4L2 controls:** query and set image adjustments on `/dev/video*`
//! - **Permissions:** device node access checks and user guidance

pub mod permissions;
#[cfg(target_os = "linux")]
pub mod v4l2;
