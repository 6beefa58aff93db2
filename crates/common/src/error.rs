//! Error types shared across avcal crates.

/// Top-level error type for avcal operations.
#[derive(Debug, thiserror::Error)]
pub enum AvcalError {
    /// No camera/microphone access at all. Fatal to the flow.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Zero capture-capable devices of a required kind after filtering.
    #[error("{}", no_devices_message(.video_missing, .audio_missing))]
    NoDevicesFound {
        video_missing: bool,
        audio_missing: bool,
    },

    /// A single device could not be opened or reconciled. Absorbed by the
    /// acquisition loop; never shown as a blocking error.
    #[error("Failed to acquire device {device_id}: {message}")]
    DeviceAcquisitionFailed { device_id: String, message: String },

    #[error("Corrupt persisted settings under {key}: {message}")]
    CorruptPersistedSettings { key: String, message: String },

    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Constraint cannot be satisfied: {constraint}")]
    Overconstrained { constraint: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Settings store error: {message}")]
    Store { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AvcalError.
pub type AvcalResult<T> = Result<T, AvcalError>;

fn no_devices_message(video_missing: &bool, audio_missing: &bool) -> &'static str {
    match (*video_missing, *audio_missing) {
        (true, true) => "No video or audio input device detected. The program will not work.",
        (true, false) => "No video input device detected. The program will not work.",
        (false, true) => "No audio input device detected. The program will not work.",
        (false, false) => "Input devices detected.",
    }
}

impl AvcalError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn no_devices(video_missing: bool, audio_missing: bool) -> Self {
        Self::NoDevicesFound {
            video_missing,
            audio_missing,
        }
    }

    pub fn device_acquisition(device_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DeviceAcquisitionFailed {
            device_id: device_id.into(),
            message: msg.into(),
        }
    }

    pub fn corrupt_settings(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CorruptPersistedSettings {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn overconstrained(constraint: impl Into<String>) -> Self {
        Self::Overconstrained {
            constraint: constraint.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error halts the calibration flow and must be shown to
    /// the user. Everything else is recovered per device.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::NoDevicesFound { .. }
        )
    }
}
