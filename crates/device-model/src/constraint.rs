//! Stream-open constraints and best-effort soft constraints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::{Resolution, VideoParam};

/// Constraints used to open a capture stream pinned to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenConstraints {
    /// Exact device to open. Never falls back to another device.
    pub device_id: String,
    pub media: MediaConstraints,
}

/// Kind-specific part of [`OpenConstraints`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaConstraints {
    Video {
        /// Preferred frame size; the stream is scaled to it when the device
        /// cannot produce it natively.
        ideal_resolution: Resolution,
        frame_rate: u32,
    },
    Audio {
        channels: u32,
        sample_rate: u32,
        echo_cancellation: bool,
        noise_suppression: bool,
        auto_gain_control: bool,
    },
}

impl OpenConstraints {
    pub fn video(device_id: impl Into<String>, ideal_resolution: Resolution, frame_rate: u32) -> Self {
        Self {
            device_id: device_id.into(),
            media: MediaConstraints::Video {
                ideal_resolution,
                frame_rate,
            },
        }
    }

    /// Audio constraints with a fixed format; `processing` toggles echo
    /// cancellation, noise suppression and automatic gain together.
    pub fn audio(
        device_id: impl Into<String>,
        channels: u32,
        sample_rate: u32,
        processing: bool,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            media: MediaConstraints::Audio {
                channels,
                sample_rate,
                echo_cancellation: processing,
                noise_suppression: processing,
                auto_gain_control: processing,
            },
        }
    }
}

/// A single soft constraint applied to a live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Constraint {
    Video { param: VideoParam, value: i32 },
    /// Monitor output volume in `[0, 100]`.
    Volume { value: u8 },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Video { param, value } => write!(f, "{param}={value}"),
            Constraint::Volume { value } => write!(f, "volume={value}"),
        }
    }
}

/// What happened to one soft constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConstraintOutcome {
    Applied,
    /// The stream does not support the parameter.
    SkippedUnsupported,
    /// The device rejected the value this time.
    Failed { reason: String },
}

/// Per-constraint result of a soft constraint update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub constraint: Constraint,
    pub outcome: ConstraintOutcome,
}

impl ConstraintReport {
    pub fn applied(constraint: Constraint) -> Self {
        Self {
            constraint,
            outcome: ConstraintOutcome::Applied,
        }
    }

    pub fn unsupported(constraint: Constraint) -> Self {
        Self {
            constraint,
            outcome: ConstraintOutcome::SkippedUnsupported,
        }
    }

    pub fn failed(constraint: Constraint, reason: impl Into<String>) -> Self {
        Self {
            constraint,
            outcome: ConstraintOutcome::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Counts of a batch of [`ConstraintReport`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplySummary {
    pub fn of(reports: &[ConstraintReport]) -> Self {
        reports
            .iter()
            .fold(Self::default(), |mut acc, report| {
                match report.outcome {
                    ConstraintOutcome::Applied => acc.applied += 1,
                    ConstraintOutcome::SkippedUnsupported => acc.skipped += 1,
                    ConstraintOutcome::Failed { .. } => acc.failed += 1,
                }
                acc
            })
    }
}
