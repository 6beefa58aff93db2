pub mod acquire;
pub mod check;
pub mod config;
pub mod devices;
pub mod exclude;
pub mod settings;

use avcal_capture_engine::{default_backend, CalibrationFlow};
use avcal_common::config::AppConfig;
use avcal_settings_store::ConfigStore;

/// Open the configured settings store.
pub fn open_store(config: &AppConfig) -> anyhow::Result<ConfigStore> {
    ConfigStore::open(&config.store_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to open settings store {}: {e}",
            config.store_path.display()
        )
    })
}

/// Calibration flow over the platform backend and the configured store.
pub fn new_flow(config: &AppConfig) -> anyhow::Result<CalibrationFlow> {
    Ok(CalibrationFlow::new(
        default_backend(),
        open_store(config)?,
        config.capture.clone(),
    ))
}
