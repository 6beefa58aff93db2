//! Scripted capture backend for engine tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use avcal_capture_engine::{CaptureBackend, CaptureStream, TrackInfo};
use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{
    Constraint, ConstraintReport, DeviceDescriptor, DeviceKind, MediaKind, OpenConstraints,
    ParamRange, VideoCapabilities, VideoParam,
};

#[derive(Clone)]
struct FakeDevice {
    descriptor: DeviceDescriptor,
    /// `None` means the stream cannot be queried.
    capabilities: Option<VideoCapabilities>,
    fail_open: bool,
    fail_probe: bool,
}

#[derive(Default)]
struct FakeState {
    devices: Vec<FakeDevice>,
    access_denied: bool,
    opened: Vec<Arc<FakeStream>>,
    open_requests: Vec<OpenConstraints>,
}

/// Backend whose devices and failures are set up by the test. Clones share
/// state, so a test keeps one handle after boxing another into the engine.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn push(self, descriptor: DeviceDescriptor, capabilities: Option<VideoCapabilities>) -> Self {
        self.state().devices.push(FakeDevice {
            descriptor,
            capabilities,
            fail_open: false,
            fail_probe: false,
        });
        self
    }

    pub fn with_camera(self, id: &str, capabilities: VideoCapabilities) -> Self {
        let label = format!("Camera {id}");
        self.push(
            DeviceDescriptor::new(id, DeviceKind::VideoInput, label),
            Some(capabilities),
        )
    }

    /// A camera whose stream does not support capability queries, such as
    /// one whose control node the user cannot open.
    pub fn with_opaque_camera(self, id: &str) -> Self {
        self.push(DeviceDescriptor::new(id, DeviceKind::VideoInput, ""), None)
    }

    pub fn with_microphone(self, id: &str) -> Self {
        let label = format!("Microphone {id}");
        self.push(DeviceDescriptor::new(id, DeviceKind::AudioInput, label), None)
    }

    pub fn with_output(self, id: &str) -> Self {
        self.push(DeviceDescriptor::new(id, DeviceKind::AudioOutput, "Speakers"), None)
    }

    pub fn failing_open(self, id: &str) -> Self {
        self.device_mut(id, |device| device.fail_open = true);
        self
    }

    pub fn failing_probe(self, id: &str) -> Self {
        self.device_mut(id, |device| device.fail_probe = true);
        self
    }

    pub fn deny_access(self) -> Self {
        self.set_access_denied(true);
        self
    }

    pub fn set_access_denied(&self, denied: bool) {
        self.state().access_denied = denied;
    }

    fn device_mut(&self, id: &str, f: impl FnOnce(&mut FakeDevice)) {
        let mut state = self.state();
        let device = state
            .devices
            .iter_mut()
            .find(|device| device.descriptor.id == id)
            .unwrap();
        f(device);
    }

    pub fn boxed(&self) -> Box<dyn CaptureBackend> {
        Box::new(self.clone())
    }

    /// Every stream opened so far, in open order.
    pub fn opened(&self) -> Vec<Arc<FakeStream>> {
        self.state().opened.clone()
    }

    pub fn opened_ids(&self) -> Vec<String> {
        self.opened()
            .iter()
            .map(|stream| stream.device_id.clone())
            .collect()
    }

    pub fn stream(&self, id: &str) -> Arc<FakeStream> {
        self.opened()
            .into_iter()
            .rev()
            .find(|stream| stream.device_id == id)
            .unwrap()
    }

    pub fn open_requests(&self) -> Vec<OpenConstraints> {
        self.state().open_requests.clone()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FakeBackend {
    async fn request_access(&self) -> AvcalResult<()> {
        if self.state().access_denied {
            return Err(AvcalError::permission_denied("denied by test"));
        }
        Ok(())
    }

    async fn enumerate(&self) -> AvcalResult<Vec<DeviceDescriptor>> {
        Ok(self
            .state()
            .devices
            .iter()
            .map(|device| device.descriptor.clone())
            .collect())
    }

    async fn open_stream(
        &self,
        device: &DeviceDescriptor,
        constraints: &OpenConstraints,
    ) -> AvcalResult<Arc<dyn CaptureStream>> {
        let mut state = self.state();
        state.open_requests.push(constraints.clone());

        let fake = state
            .devices
            .iter()
            .find(|candidate| candidate.descriptor == *device)
            .cloned()
            .ok_or_else(|| AvcalError::device_unavailable(format!("{} unplugged", device.id)))?;
        if fake.fail_open {
            return Err(AvcalError::device_unavailable(format!("{} is busy", device.id)));
        }

        let stream = Arc::new(FakeStream {
            device_id: device.id.clone(),
            kind: device.media_kind().unwrap(),
            label: device.label.clone(),
            capabilities: fake.capabilities,
            fail_probe: fake.fail_probe,
            live: AtomicBool::new(true),
            applied: Mutex::new(Vec::new()),
        });
        state.opened.push(stream.clone());
        Ok(stream as Arc<dyn CaptureStream>)
    }
}

/// Stream that records the soft constraints it receives.
pub struct FakeStream {
    pub device_id: String,
    pub kind: MediaKind,
    label: String,
    capabilities: Option<VideoCapabilities>,
    fail_probe: bool,
    live: AtomicBool,
    applied: Mutex<Vec<Constraint>>,
}

impl FakeStream {
    /// Constraints that were applied, in order.
    pub fn applied(&self) -> Vec<Constraint> {
        self.applied.lock().unwrap().clone()
    }

    pub fn is_live_now(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureStream for FakeStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: format!("{}-track", self.device_id),
            kind: self.kind,
            label: self.label.clone(),
        }]
    }

    async fn video_capabilities(&self) -> AvcalResult<VideoCapabilities> {
        if self.fail_probe {
            return Err(AvcalError::device_unavailable("device vanished while probing"));
        }
        self.capabilities
            .clone()
            .ok_or_else(|| AvcalError::unsupported("no capability query"))
    }

    async fn apply_constraints(&self, constraints: &[Constraint]) -> Vec<ConstraintReport> {
        constraints
            .iter()
            .map(|constraint| {
                let supported = match constraint {
                    Constraint::Video { param, .. } => self
                        .capabilities
                        .as_ref()
                        .is_some_and(|caps| caps.supports(*param)),
                    Constraint::Volume { .. } => self.kind == MediaKind::Audio,
                };
                if supported {
                    self.applied.lock().unwrap().push(*constraint);
                    ConstraintReport::applied(*constraint)
                } else {
                    ConstraintReport::unsupported(*constraint)
                }
            })
            .collect()
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// `brightness [0,100,1]`, `contrast [0,50,1]`.
pub fn brightness_contrast() -> VideoCapabilities {
    VideoCapabilities::none()
        .with(VideoParam::Brightness, ParamRange::new(0.0, 100.0, 1.0))
        .with(VideoParam::Contrast, ParamRange::new(0.0, 50.0, 1.0))
}
