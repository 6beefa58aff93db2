//! Persisted per-device settings.
//!
//! Settings are opaque to the store: there is no schema version, and a
//! settings object written by an older build (or for a device whose driver
//! exposed a different set of controls) must still load. Unknown keys are
//! ignored and every numeric field is optional.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::capability::round_half_up;

/// Image adjustment a camera may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoParam {
    Brightness,
    Contrast,
    Saturation,
}

impl VideoParam {
    pub const ALL: [VideoParam; 3] = [
        VideoParam::Brightness,
        VideoParam::Contrast,
        VideoParam::Saturation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VideoParam::Brightness => "brightness",
            VideoParam::Contrast => "contrast",
            VideoParam::Saturation => "saturation",
        }
    }
}

impl fmt::Display for VideoParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoParam::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown video parameter: {s}"))
    }
}

/// Capture resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Persisted camera settings (`video.<id>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<i32>,

    /// Fixed when the device is first seen; never re-reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl VideoSettings {
    pub fn get(&self, param: VideoParam) -> Option<i32> {
        match param {
            VideoParam::Brightness => self.brightness,
            VideoParam::Contrast => self.contrast,
            VideoParam::Saturation => self.saturation,
        }
    }

    pub fn set(&mut self, param: VideoParam, value: Option<i32>) {
        let slot = match param {
            VideoParam::Brightness => &mut self.brightness,
            VideoParam::Contrast => &mut self.contrast,
            VideoParam::Saturation => &mut self.saturation,
        };
        *slot = value;
    }

    /// Builder-style setter for a single adjustable value.
    pub fn with(mut self, param: VideoParam, value: i32) -> Self {
        self.set(param, Some(value));
        self
    }

    /// Adjustable values present in these settings, in parameter order.
    pub fn adjustable(&self) -> impl Iterator<Item = (VideoParam, i32)> + '_ {
        VideoParam::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|v| (p, v)))
    }

    /// Whether no field at all is stored.
    pub fn is_empty(&self) -> bool {
        self.adjustable().next().is_none() && self.resolution.is_none()
    }

    /// Replace every adjustable key with the values in `update`.
    ///
    /// Adjustable keys missing from `update` are removed. The resolution is
    /// not adjustable and is kept.
    pub fn replace_adjustable(&self, update: &VideoSettings) -> VideoSettings {
        VideoSettings {
            brightness: update.brightness,
            contrast: update.contrast,
            saturation: update.saturation,
            resolution: self.resolution,
        }
    }
}

/// Volume used for audio devices seen for the first time.
pub const DEFAULT_VOLUME: u8 = 50;

/// Upper bound of the monitor volume scale.
pub const MAX_VOLUME: u8 = 100;

fn default_volume() -> i64 {
    i64::from(DEFAULT_VOLUME)
}

/// Any JSON number, rounded to an integer. Range is enforced on read by
/// [`AudioSettings::effective_volume`].
fn deserialize_volume<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(round_half_up(raw) as i64)
}

/// Persisted microphone settings (`audio.<id>`).
///
/// The stored volume is kept as written, even outside `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default = "default_volume", deserialize_with = "deserialize_volume")]
    pub volume: i64,
}

impl AudioSettings {
    pub fn new(volume: u8) -> Self {
        Self {
            volume: i64::from(volume.min(MAX_VOLUME)),
        }
    }

    /// Volume clamped into `[0, 100]`.
    pub fn effective_volume(&self) -> u8 {
        self.volume.clamp(0, i64::from(MAX_VOLUME)) as u8
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}
