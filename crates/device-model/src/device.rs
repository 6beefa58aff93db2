//! Device descriptors produced by enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capture media kind. Also the namespace of a device's persisted settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Key prefix used by the settings store (`video.<id>` / `audio.<id>`).
    pub fn key_prefix(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_prefix())
    }
}

/// Device class as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    /// Output-only device (speakers, headphones). Never opened for capture.
    AudioOutput,
}

impl DeviceKind {
    /// Capture media kind, or `None` for output-only devices.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            DeviceKind::VideoInput => Some(MediaKind::Video),
            DeviceKind::AudioInput => Some(MediaKind::Audio),
            DeviceKind::AudioOutput => None,
        }
    }
}

/// A device as seen by one enumeration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable identifier; the identity of the device.
    pub id: String,
    pub kind: DeviceKind,
    /// Human-readable name. May be empty before permission is granted.
    pub label: String,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.kind.media_kind()
    }

    /// Label for display, falling back to the id when the label is empty.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}
