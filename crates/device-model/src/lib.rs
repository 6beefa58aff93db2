//! avcal device model.
//!
//! Cross-crate data contracts for capture devices and their calibration:
//! - **Devices:** descriptors produced by enumeration
//! - **Settings:** per-device persisted video/audio settings
//! - **Capabilities:** live tunable parameters with their ranges
//! - **Constraints:** stream-open pins and best-effort soft constraints
//! - **Effective config:** stored settings narrowed to live capability
//! - **Exclusions:** user-hidden device identifiers

pub mod capability;
pub mod constraint;
pub mod device;
pub mod effective;
pub mod exclusion;
pub mod settings;

pub use capability::*;
pub use constraint::*;
pub use device::*;
pub use effective::*;
pub use exclusion::*;
pub use settings::*;
