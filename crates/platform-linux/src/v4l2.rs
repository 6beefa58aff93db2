//! V4L2 image controls.
//!
//! Reads control ranges with `VIDIOC_QUERYCTRL` and applies values with
//! `VIDIOC_S_CTRL` on the device node backing a camera stream.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use avcal_device_model::{ParamRange, VideoCapabilities, VideoParam};

const V4L2_CTRL_CLASS_USER: u32 = 0x00980000;
const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;

pub const V4L2_CID_BRIGHTNESS: u32 = V4L2_CID_BASE;
pub const V4L2_CID_CONTRAST: u32 = V4L2_CID_BASE + 1;
pub const V4L2_CID_SATURATION: u32 = V4L2_CID_BASE + 2;

const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
const V4L2_CTRL_TYPE_BOOLEAN: u32 = 2;
const V4L2_CTRL_TYPE_MENU: u32 = 3;

const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_READ_ONLY: u32 = 0x0004;

// (dir << 30) | (size << 16) | ('V' << 8) | nr, dir 3 = READ|WRITE
const VIDIOC_G_CTRL: u32 = 0xC008561B;
const VIDIOC_S_CTRL: u32 = 0xC008561C;
const VIDIOC_QUERYCTRL: u32 = 0xC0445624;

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// V4L2 control type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
    Unknown(u32),
}

impl From<u32> for ControlType {
    fn from(value: u32) -> Self {
        match value {
            V4L2_CTRL_TYPE_INTEGER => ControlType::Integer,
            V4L2_CTRL_TYPE_BOOLEAN => ControlType::Boolean,
            V4L2_CTRL_TYPE_MENU => ControlType::Menu,
            other => ControlType::Unknown(other),
        }
    }
}

/// Description of one control as reported by the driver.
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub ctrl_type: ControlType,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_READ_ONLY != 0
    }

    /// Whether a slider can drive this control.
    pub fn is_adjustable(&self) -> bool {
        self.ctrl_type == ControlType::Integer && !self.is_disabled() && !self.is_read_only()
    }

    pub fn range(&self, current: Option<i32>) -> ParamRange {
        let range = ParamRange::new(
            self.minimum as f64,
            self.maximum as f64,
            self.step.max(1) as f64,
        );
        match current {
            Some(value) => range.with_current(value as f64),
            None => range,
        }
    }
}

/// Control id for an image adjustment.
pub fn control_id(param: VideoParam) -> u32 {
    match param {
        VideoParam::Brightness => V4L2_CID_BRIGHTNESS,
        VideoParam::Contrast => V4L2_CID_CONTRAST,
        VideoParam::Saturation => V4L2_CID_SATURATION,
    }
}

fn extract_name(bytes: &[u8; 32]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(32);
    String::from_utf8_lossy(&bytes[..len]).to_string()
}

/// Query a control. `None` when the device does not expose it.
pub fn query_control(file: &File, control_id: u32) -> Option<ControlInfo> {
    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    // SAFETY: qctrl is a valid, correctly sized v4l2_queryctrl for the fd's lifetime.
    let result = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            VIDIOC_QUERYCTRL as _,
            &mut qctrl as *mut V4l2Queryctrl,
        )
    };
    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        ctrl_type: qctrl.ctrl_type.into(),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Current value of a control.
pub fn get_control(file: &File, control_id: u32) -> Option<i32> {
    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    // SAFETY: ctrl is a valid v4l2_control.
    let result = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            VIDIOC_G_CTRL as _,
            &mut ctrl as *mut V4l2Control,
        )
    };
    if result < 0 {
        tracing::debug!(control_id, "Failed to get V4L2 control");
        return None;
    }
    Some(ctrl.value)
}

/// Set a control. Returns the value the driver kept, which may be clamped.
pub fn set_control(file: &File, control_id: u32, value: i32) -> io::Result<i32> {
    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    // SAFETY: ctrl is a valid v4l2_control.
    let result = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            VIDIOC_S_CTRL as _,
            &mut ctrl as *mut V4l2Control,
        )
    };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    if ctrl.value != value {
        tracing::debug!(
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }
    Ok(ctrl.value)
}

/// Open a device node for control access.
pub fn open_device(device_path: &Path) -> io::Result<File> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(device_path)
}

/// Image adjustments supported by the device at `device_path`.
pub fn query_video_capabilities(device_path: &Path) -> io::Result<VideoCapabilities> {
    let file = open_device(device_path)?;
    let mut capabilities = VideoCapabilities::none();

    for param in VideoParam::ALL {
        let id = control_id(param);
        let Some(info) = query_control(&file, id) else {
            continue;
        };
        if !info.is_adjustable() {
            tracing::debug!(
                device = %device_path.display(),
                control = %info.name,
                ?info.ctrl_type,
                flags = info.flags,
                "Skipping non-adjustable control"
            );
            continue;
        }
        let current = get_control(&file, id);
        capabilities.set_range(param, Some(info.range(current)));
    }

    Ok(capabilities)
}
