//! avcal settings store.
//!
//! Persists per-device calibration in a local key-value store:
//!
//! | key                | value                        |
//! |--------------------|------------------------------|
//! | `video.<deviceId>` | JSON [`VideoSettings`]       |
//! | `audio.<deviceId>` | JSON [`AudioSettings`]       |
//! | `exclude.devices`  | JSON array of device ids     |
//!
//! The JSON encoding is an implementation detail of [`ConfigStore`]; callers
//! only see typed settings.
//!
//! [`VideoSettings`]: avcal_device_model::VideoSettings
//! [`AudioSettings`]: avcal_device_model::AudioSettings

pub mod config_store;
pub mod kv;

pub use config_store::*;
pub use kv::*;
