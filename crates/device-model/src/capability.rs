//! Live device capabilities.
//!
//! Every tunable parameter is an explicit `Option<ParamRange>`: `None` means
//! the device does not support it, `Some` with `current: None` means it is
//! supported but its present value is unknown.

use serde::{Deserialize, Serialize};

use crate::settings::{Resolution, VideoParam, MAX_VOLUME};

/// Valid range of a tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Value currently reported by the device, if known.
    pub current: Option<f64>,
}

impl ParamRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            min,
            max,
            step,
            current: None,
        }
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = Some(current);
        self
    }

    /// Midpoint of the range, rounded to the nearest integer. Halves round
    /// up, so `[-3, 0]` gives `-1`.
    pub fn midpoint(&self) -> i32 {
        round_half_up((self.min + self.max) / 2.0) as i32
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min.min(self.max), self.max.max(self.min))
    }
}

/// Nearest integer, halves toward positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Supported frame size range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRange {
    pub width: ParamRange,
    pub height: ParamRange,
}

impl ResolutionRange {
    /// Closest supported resolution to `wanted`, per axis.
    pub fn clamp(&self, wanted: Resolution) -> Resolution {
        Resolution {
            width: self.width.clamp(wanted.width as f64).round() as u32,
            height: self.height.clamp(wanted.height as f64).round() as u32,
        }
    }
}

/// Tunable parameters of a camera stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoCapabilities {
    pub brightness: Option<ParamRange>,
    pub contrast: Option<ParamRange>,
    pub saturation: Option<ParamRange>,
    pub resolution: Option<ResolutionRange>,
}

impl VideoCapabilities {
    /// A device with no tunable parameters.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn range(&self, param: VideoParam) -> Option<&ParamRange> {
        match param {
            VideoParam::Brightness => self.brightness.as_ref(),
            VideoParam::Contrast => self.contrast.as_ref(),
            VideoParam::Saturation => self.saturation.as_ref(),
        }
    }

    pub fn set_range(&mut self, param: VideoParam, range: Option<ParamRange>) {
        let slot = match param {
            VideoParam::Brightness => &mut self.brightness,
            VideoParam::Contrast => &mut self.contrast,
            VideoParam::Saturation => &mut self.saturation,
        };
        *slot = range;
    }

    /// Builder-style setter.
    pub fn with(mut self, param: VideoParam, range: ParamRange) -> Self {
        self.set_range(param, Some(range));
        self
    }

    pub fn supports(&self, param: VideoParam) -> bool {
        self.range(param).is_some()
    }

    /// Supported adjustable parameters, in parameter order.
    pub fn supported(&self) -> impl Iterator<Item = (VideoParam, &ParamRange)> + '_ {
        VideoParam::ALL
            .into_iter()
            .filter_map(|p| self.range(p).map(|r| (p, r)))
    }

    pub fn is_empty(&self) -> bool {
        self.supported().next().is_none() && self.resolution.is_none()
    }
}

/// Microphone capabilities. Volume is a software property and always
/// supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioCapabilities {
    pub volume: ParamRange,
}

impl Default for AudioCapabilities {
    fn default() -> Self {
        Self {
            volume: ParamRange::new(0.0, MAX_VOLUME as f64, 1.0),
        }
    }
}

/// Probe result for either kind of stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceCapabilities {
    Video(VideoCapabilities),
    Audio(AudioCapabilities),
}
