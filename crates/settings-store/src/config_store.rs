//! Typed access to persisted device settings.

use std::path::Path;

use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{AudioSettings, ExclusionList, MediaKind, VideoSettings};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::kv::{JsonFileStore, KeyValueStore, MemoryStore};

/// Key holding the JSON array of excluded device ids.
pub const EXCLUSIONS_KEY: &str = "exclude.devices";

/// Per-device settings keyed by `(kind, device id)`.
///
/// The store never validates settings. A stored value that fails to parse is
/// logged and reported as absent.
pub struct ConfigStore {
    kv: Box<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    /// Open the JSON file store at `path`.
    pub fn open(path: impl AsRef<Path>) -> AvcalResult<Self> {
        Ok(Self::new(JsonFileStore::open(path.as_ref())?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Namespaced key for a device's settings.
    pub fn settings_key(kind: MediaKind, device_id: &str) -> String {
        format!("{}.{device_id}", kind.key_prefix())
    }

    pub fn load_video(&self, device_id: &str) -> Option<VideoSettings> {
        self.load(&Self::settings_key(MediaKind::Video, device_id))
    }

    pub fn save_video(&mut self, device_id: &str, settings: &VideoSettings) -> AvcalResult<()> {
        self.save(&Self::settings_key(MediaKind::Video, device_id), settings)
    }

    pub fn load_audio(&self, device_id: &str) -> Option<AudioSettings> {
        self.load(&Self::settings_key(MediaKind::Audio, device_id))
    }

    pub fn save_audio(&mut self, device_id: &str, settings: &AudioSettings) -> AvcalResult<()> {
        self.save(&Self::settings_key(MediaKind::Audio, device_id), settings)
    }

    /// Stored exclusion list; empty when absent or corrupt.
    pub fn load_exclusions(&self) -> ExclusionList {
        self.load::<ExclusionList>(EXCLUSIONS_KEY).unwrap_or_default()
    }

    pub fn save_exclusions(&mut self, exclusions: &ExclusionList) -> AvcalResult<()> {
        self.save(EXCLUSIONS_KEY, exclusions)
    }

    /// Drop both settings entries of a device. Returns whether anything was
    /// stored.
    pub fn forget(&mut self, device_id: &str) -> AvcalResult<bool> {
        let video = self
            .kv
            .remove(&Self::settings_key(MediaKind::Video, device_id))?;
        let audio = self
            .kv
            .remove(&Self::settings_key(MediaKind::Audio, device_id))?;
        Ok(video || audio)
    }

    /// Devices that have stored settings, as `(kind, id)` pairs.
    pub fn known_devices(&self) -> Vec<(MediaKind, String)> {
        self.kv
            .keys()
            .into_iter()
            .filter_map(|key| {
                if let Some(id) = key.strip_prefix("video.") {
                    Some((MediaKind::Video, id.to_string()))
                } else {
                    key.strip_prefix("audio.")
                        .map(|id| (MediaKind::Audio, id.to_string()))
                }
            })
            .collect()
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Settings read failed; treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                let err = AvcalError::corrupt_settings(key, e.to_string());
                tracing::warn!(key, error = %err, "Ignoring corrupt persisted settings");
                None
            }
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> AvcalResult<()> {
        let json = serde_json::to_string(value)?;
        tracing::debug!(key, value = %json, "Persisting settings");
        self.kv.set(key, json)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("keys", &self.kv.keys())
            .finish()
    }
}
