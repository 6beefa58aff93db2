//! Effective configuration: stored settings narrowed to live capability.
//!
//! Derived on every reconciliation and never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capability::{ParamRange, VideoCapabilities};
use crate::constraint::Constraint;
use crate::settings::VideoParam;

/// Adjustable camera values that the live device supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveVideoConfig {
    values: BTreeMap<VideoParam, i32>,
}

impl EffectiveVideoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: VideoParam, value: i32) {
        self.values.insert(param, value);
    }

    pub fn get(&self, param: VideoParam) -> Option<i32> {
        self.values.get(&param).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VideoParam, i32)> + '_ {
        self.values.iter().map(|(p, v)| (*p, *v))
    }

    /// Soft constraints that apply this configuration.
    pub fn constraints(&self) -> Vec<Constraint> {
        self.iter()
            .map(|(param, value)| Constraint::Video { param, value })
            .collect()
    }

    /// Controls to render: each effective value paired with its live range.
    pub fn controls(&self, capabilities: &VideoCapabilities) -> Vec<AdjustableControl> {
        self.iter()
            .filter_map(|(param, value)| {
                capabilities.range(param).map(|range| AdjustableControl {
                    param,
                    range: *range,
                    value,
                })
            })
            .collect()
    }
}

/// One slider's worth of state for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustableControl {
    pub param: VideoParam,
    pub range: ParamRange,
    pub value: i32,
}

/// Effective microphone configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAudioConfig {
    pub volume: u8,
}

impl EffectiveAudioConfig {
    pub fn constraints(&self) -> Vec<Constraint> {
        vec![Constraint::Volume { value: self.volume }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_pair_values_with_ranges() {
        let caps = VideoCapabilities::none()
            .with(VideoParam::Brightness, ParamRange::new(0.0, 100.0, 1.0));
        let mut effective = EffectiveVideoConfig::new();
        effective.insert(VideoParam::Brightness, 42);

        let controls = effective.controls(&caps);
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].value, 42);
        assert_eq!(controls[0].range.max, 100.0);
    }

    #[test]
    fn constraints_follow_parameter_order() {
        let mut effective = EffectiveVideoConfig::new();
        effective.insert(VideoParam::Saturation, 3);
        effective.insert(VideoParam::Brightness, 1);

        let constraints = effective.constraints();
        assert_eq!(
            constraints,
            vec![
                Constraint::Video {
                    param: VideoParam::Brightness,
                    value: 1
                },
                Constraint::Video {
                    param: VideoParam::Saturation,
                    value: 3
                },
            ]
        );
    }
}
