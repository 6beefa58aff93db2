//! avcal Capture Engine
//!
//! Discovers cameras and microphones, holds a live stream open per device,
//! and reconciles each device's persisted settings with what the hardware
//! supports right now.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   CalibrationFlow                    │
//! │  ┌───────────────────┐        ┌───────────────────┐  │
//! │  │ AcquisitionEngine │───────▶│  SessionRegistry  │  │
//! │  │  (owns streams)   │ weak   │ (lookup, select)  │  │
//! │  └────────┬──────────┘        └───────────────────┘  │
//! │           │ probe + reconcile                        │
//! │           ▼                                          │
//! │  ┌───────────────────┐        ┌───────────────────┐  │
//! │  │ DeviceReconciler  │───────▶│    ConfigStore    │  │
//! │  └───────────────────┘        └───────────────────┘  │
//! └───────────┬──────────────────────────────────────────┘
//!             ▼
//!      CaptureBackend (GStreamer + V4L2)
//! ```

pub mod acquisition;
pub mod backend;
pub mod flow;
pub mod pipeline;
pub mod probe;
pub mod reconciler;
pub mod registry;

pub use acquisition::{AcquiredDevice, AcquisitionEngine, AcquisitionReport, SkippedDevice};
pub use backend::{default_backend, CaptureBackend, CaptureStream, GstBackend, TrackInfo};
pub use flow::{CalibrationFlow, FlowState};
pub use reconciler::{DeviceReconciler, Reconciliation};
pub use registry::{CombinedStream, SessionRegistry};
