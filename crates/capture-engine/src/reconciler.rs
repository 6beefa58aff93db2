//! Reconciliation of persisted settings against live capability.
//!
//! Rules:
//! - Nothing stored: every supported parameter defaults to the midpoint of
//!   its range, the resolution to the baseline clamped into the supported
//!   range. The defaults are persisted.
//! - Something stored: the effective config is the stored values whose keys
//!   the device supports. Nothing is written.
//! - A user update replaces the adjustable keys wholesale, is persisted, and
//!   is re-applied to the live stream.
//!
//! Reconciliation never fails on a mismatch and never yields a key the
//! device does not support.

use avcal_common::error::AvcalResult;
use avcal_device_model::{
    AudioSettings, ConstraintReport, EffectiveAudioConfig, EffectiveVideoConfig, Resolution,
    VideoCapabilities, VideoSettings,
};
use avcal_settings_store::ConfigStore;

use crate::backend::CaptureStream;

/// Outcome of reconciling one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<E> {
    pub effective: E,
    /// Whether first-seen defaults were persisted.
    pub defaults_written: bool,
}

/// Settings a camera gets the first time it is seen.
pub fn first_probe_defaults(capabilities: &VideoCapabilities, baseline: Resolution) -> VideoSettings {
    let mut settings = VideoSettings::default();
    for (param, range) in capabilities.supported() {
        settings.set(param, Some(range.midpoint()));
    }
    settings.resolution = capabilities
        .resolution
        .as_ref()
        .map(|range| range.clamp(baseline));
    settings
}

/// Stored values narrowed to the parameters the device supports.
pub fn narrow_to_capability(
    stored: &VideoSettings,
    capabilities: &VideoCapabilities,
) -> EffectiveVideoConfig {
    let mut effective = EffectiveVideoConfig::new();
    for (param, value) in stored.adjustable() {
        if capabilities.supports(param) {
            effective.insert(param, value);
        }
    }
    effective
}

/// Merges the [`ConfigStore`] with live capability. Sole writer of device
/// settings.
#[derive(Debug)]
pub struct DeviceReconciler {
    store: ConfigStore,
    baseline: Resolution,
}

impl DeviceReconciler {
    pub fn new(store: ConfigStore, baseline: Resolution) -> Self {
        Self { store, baseline }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Resolution to request when opening the camera: the stored one, or
    /// the baseline for a device not seen before.
    pub fn open_resolution(&self, device_id: &str) -> Resolution {
        self.store
            .load_video(device_id)
            .and_then(|settings| settings.resolution)
            .unwrap_or(self.baseline)
    }

    pub fn reconcile_video(
        &mut self,
        device_id: &str,
        capabilities: &VideoCapabilities,
    ) -> AvcalResult<Reconciliation<EffectiveVideoConfig>> {
        if let Some(stored) = self.store.load_video(device_id) {
            let effective = narrow_to_capability(&stored, capabilities);
            let ignored = stored.adjustable().count() - effective.len();
            if ignored > 0 {
                tracing::debug!(
                    device_id,
                    ignored,
                    "Stored values outside live capability ignored"
                );
            }
            return Ok(Reconciliation {
                effective,
                defaults_written: false,
            });
        }

        let defaults = first_probe_defaults(capabilities, self.baseline);
        self.store.save_video(device_id, &defaults)?;
        tracing::info!(
            device_id,
            params = defaults.adjustable().count(),
            resolution = ?defaults.resolution,
            "First-seen camera defaults persisted"
        );

        Ok(Reconciliation {
            effective: narrow_to_capability(&defaults, capabilities),
            defaults_written: true,
        })
    }

    pub fn reconcile_audio(
        &mut self,
        device_id: &str,
    ) -> AvcalResult<Reconciliation<EffectiveAudioConfig>> {
        if let Some(stored) = self.store.load_audio(device_id) {
            return Ok(Reconciliation {
                effective: EffectiveAudioConfig {
                    volume: stored.effective_volume(),
                },
                defaults_written: false,
            });
        }

        let defaults = AudioSettings::default();
        self.store.save_audio(device_id, &defaults)?;
        let volume = defaults.effective_volume();
        tracing::info!(device_id, volume, "First-seen microphone defaults persisted");

        Ok(Reconciliation {
            effective: EffectiveAudioConfig { volume },
            defaults_written: true,
        })
    }

    /// Effective video config without writing anything.
    pub fn effective_video(
        &self,
        device_id: &str,
        capabilities: &VideoCapabilities,
    ) -> EffectiveVideoConfig {
        let stored = self
            .store
            .load_video(device_id)
            .unwrap_or_else(|| first_probe_defaults(capabilities, self.baseline));
        narrow_to_capability(&stored, capabilities)
    }

    /// Replace a camera's adjustable settings with `update` and push the
    /// supported ones to the live stream.
    pub async fn apply_user_video_update(
        &mut self,
        device_id: &str,
        capabilities: &VideoCapabilities,
        update: &VideoSettings,
        stream: &dyn CaptureStream,
    ) -> AvcalResult<Vec<ConstraintReport>> {
        let current = self.store.load_video(device_id).unwrap_or_default();
        let next = current.replace_adjustable(update);
        self.store.save_video(device_id, &next)?;

        let constraints = narrow_to_capability(&next, capabilities).constraints();
        let reports = stream.apply_constraints(&constraints).await;
        tracing::info!(device_id, applied = constraints.len(), "Camera settings updated");
        Ok(reports)
    }

    /// Persist a microphone's monitor volume and push it to the live stream.
    pub async fn set_volume(
        &mut self,
        device_id: &str,
        volume: u8,
        stream: &dyn CaptureStream,
    ) -> AvcalResult<Vec<ConstraintReport>> {
        let settings = AudioSettings::new(volume);
        self.store.save_audio(device_id, &settings)?;

        let effective = EffectiveAudioConfig {
            volume: settings.effective_volume(),
        };
        let reports = stream.apply_constraints(&effective.constraints()).await;
        tracing::info!(device_id, volume = effective.volume, "Monitor volume updated");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use avcal_device_model::{ParamRange, ResolutionRange, VideoParam};
    use avcal_settings_store::MemoryStore;
    use proptest::prelude::*;

    use super::*;

    fn caps(params: &[(VideoParam, f64, f64)]) -> VideoCapabilities {
        params
            .iter()
            .fold(VideoCapabilities::none(), |caps, (param, min, max)| {
                caps.with(*param, ParamRange::new(*min, *max, 1.0))
            })
    }

    fn reconciler(handle: &MemoryStore) -> DeviceReconciler {
        DeviceReconciler::new(ConfigStore::new(handle.clone()), Resolution::HD)
    }

    #[test]
    fn first_probe_uses_rounded_midpoints() {
        let caps = caps(&[
            (VideoParam::Brightness, 0.0, 255.0),
            (VideoParam::Saturation, -64.0, 64.0),
        ]);
        let defaults = first_probe_defaults(&caps, Resolution::HD);
        assert_eq!(defaults.brightness, Some(128));
        assert_eq!(defaults.contrast, None);
        assert_eq!(defaults.saturation, Some(0));
        assert_eq!(defaults.resolution, None);
    }

    #[test]
    fn baseline_resolution_is_clamped_into_range() {
        let mut caps = VideoCapabilities::none();
        caps.resolution = Some(ResolutionRange {
            width: ParamRange::new(320.0, 640.0, 1.0),
            height: ParamRange::new(240.0, 480.0, 1.0),
        });
        let defaults = first_probe_defaults(&caps, Resolution::HD);
        assert_eq!(defaults.resolution, Some(Resolution::new(640, 480)));
    }

    #[test]
    fn stored_resolution_is_used_to_open() {
        let handle = MemoryStore::new();
        handle.insert_raw("video.cam", r#"{"resolution":{"width":640,"height":480}}"#);
        let reconciler = reconciler(&handle);
        assert_eq!(reconciler.open_resolution("cam"), Resolution::new(640, 480));
        assert_eq!(reconciler.open_resolution("other"), Resolution::HD);
    }

    #[test]
    fn stored_values_outside_capability_are_ignored() {
        let handle = MemoryStore::new();
        handle.insert_raw("video.cam", r#"{"brightness":10,"saturation":99}"#);
        let mut reconciler = reconciler(&handle);

        let caps = caps(&[(VideoParam::Brightness, 0.0, 100.0)]);
        let outcome = reconciler.reconcile_video("cam", &caps).unwrap();

        assert_eq!(outcome.effective.get(VideoParam::Brightness), Some(10));
        assert_eq!(outcome.effective.get(VideoParam::Saturation), None);
        assert!(!outcome.defaults_written);
        assert_eq!(handle.write_count(), 0);
    }

    #[test]
    fn stored_volume_is_clamped() {
        let handle = MemoryStore::new();
        handle.insert_raw("audio.mic", r#"{"volume":180}"#);
        let mut reconciler = reconciler(&handle);

        let outcome = reconciler.reconcile_audio("mic").unwrap();
        assert_eq!(outcome.effective.volume, 100);
        assert_eq!(handle.write_count(), 0);
    }

    #[test]
    fn stored_volume_beyond_byte_range_is_kept_and_clamped() {
        for (stored, effective) in [("300", 100), ("-1", 0)] {
            let handle = MemoryStore::new();
            let raw = format!(r#"{{"volume":{stored}}}"#);
            handle.insert_raw("audio.mic", raw.clone());
            let mut reconciler = reconciler(&handle);

            let outcome = reconciler.reconcile_audio("mic").unwrap();
            assert_eq!(outcome.effective.volume, effective);
            assert!(!outcome.defaults_written);
            assert_eq!(handle.raw("audio.mic"), Some(raw));
        }
    }

    #[test]
    fn effective_video_never_writes() {
        let handle = MemoryStore::new();
        let reconciler = reconciler(&handle);
        let caps = caps(&[(VideoParam::Contrast, 0.0, 50.0)]);

        let effective = reconciler.effective_video("cam", &caps);
        assert_eq!(effective.get(VideoParam::Contrast), Some(25));
        assert_eq!(handle.write_count(), 0);
    }

    fn arb_range() -> impl Strategy<Value = Option<(f64, f64)>> {
        prop::option::of((-500i32..500, 0i32..500).prop_map(|(min, span)| {
            (min as f64, (min + span) as f64)
        }))
    }

    fn arb_caps() -> impl Strategy<Value = VideoCapabilities> {
        (arb_range(), arb_range(), arb_range()).prop_map(|(b, c, s)| {
            let mut caps = VideoCapabilities::none();
            for (param, range) in VideoParam::ALL.into_iter().zip([b, c, s]) {
                caps.set_range(param, range.map(|(min, max)| ParamRange::new(min, max, 1.0)));
            }
            caps
        })
    }

    fn arb_settings() -> impl Strategy<Value = VideoSettings> {
        (
            prop::option::of(-1000i32..1000),
            prop::option::of(-1000i32..1000),
            prop::option::of(-1000i32..1000),
        )
            .prop_map(|(brightness, contrast, saturation)| VideoSettings {
                brightness,
                contrast,
                saturation,
                resolution: None,
            })
    }

    proptest! {
        #[test]
        fn effective_config_is_stored_intersect_capability(
            stored in arb_settings(),
            caps in arb_caps(),
        ) {
            let effective = narrow_to_capability(&stored, &caps);
            for param in VideoParam::ALL {
                let expected = if caps.supports(param) { stored.get(param) } else { None };
                prop_assert_eq!(effective.get(param), expected);
            }
        }

        #[test]
        fn reconciliation_is_idempotent(
            stored in prop::option::of(arb_settings()),
            caps in arb_caps(),
        ) {
            let handle = MemoryStore::new();
            if let Some(stored) = &stored {
                handle.insert_raw("video.cam", serde_json::to_string(stored).unwrap());
            }
            let mut reconciler = reconciler(&handle);

            let first = reconciler.reconcile_video("cam", &caps).unwrap();
            let writes = handle.write_count();
            let second = reconciler.reconcile_video("cam", &caps).unwrap();

            prop_assert_eq!(&first.effective, &second.effective);
            prop_assert!(!second.defaults_written);
            prop_assert_eq!(handle.write_count(), writes);
            prop_assert_eq!(writes, usize::from(stored.is_none()));
        }

        #[test]
        fn defaults_only_cover_supported_params(caps in arb_caps()) {
            let defaults = first_probe_defaults(&caps, Resolution::HD);
            for param in VideoParam::ALL {
                match caps.range(param) {
                    Some(range) => {
                        let value = defaults.get(param).unwrap();
                        prop_assert!(range.contains(value as f64));
                        prop_assert_eq!(value, range.midpoint());
                    }
                    None => prop_assert_eq!(defaults.get(param), None),
                }
            }
        }
    }
}
