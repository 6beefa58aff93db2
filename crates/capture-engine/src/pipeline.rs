//! GStreamer pipelines that hold a capture device open.
//!
//! Nothing is recorded: every pipeline ends in a `fakesink`. Keeping the
//! source in `Playing` holds the device so controls can be changed live.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::{MediaConstraints, OpenConstraints, ParamRange, Resolution, ResolutionRange};
use gst::prelude::*;
use gstreamer as gst;

const VOLUME_ELEMENT: &str = "monitor-volume";
const START_TIMEOUT_SECS: u64 = 5;

/// A source element wired to a discard sink.
pub struct MonitorPipeline {
    name: String,
    pipeline: gst::Pipeline,
    volume: Option<gst::Element>,
    running: AtomicBool,
}

impl MonitorPipeline {
    /// Build the processing chain for `constraints` behind `source`.
    ///
    /// Video: `source ! videoconvert ! videoscale ! videorate ! capsfilter ! fakesink`.
    /// Audio: `source ! audioconvert ! audioresample ! capsfilter ! [webrtcdsp] ! volume ! fakesink`.
    pub fn build(
        name: impl Into<String>,
        source: gst::Element,
        constraints: &OpenConstraints,
    ) -> AvcalResult<Self> {
        init_gstreamer()?;
        let name = name.into();

        let mut chain = vec![source];
        let mut volume = None;
        match &constraints.media {
            MediaConstraints::Video {
                ideal_resolution,
                frame_rate,
            } => {
                chain.push(make_element("videoconvert")?);
                chain.push(make_element("videoscale")?);
                chain.push(make_element("videorate")?);
                chain.push(capsfilter(&video_caps(*ideal_resolution, *frame_rate))?);
            }
            MediaConstraints::Audio {
                channels,
                sample_rate,
                echo_cancellation,
                noise_suppression,
                auto_gain_control,
            } => {
                chain.push(make_element("audioconvert")?);
                chain.push(make_element("audioresample")?);
                chain.push(capsfilter(&audio_caps(*channels, *sample_rate))?);
                if *echo_cancellation || *noise_suppression || *auto_gain_control {
                    match gst::ElementFactory::make("webrtcdsp")
                        .property("echo-cancel", *echo_cancellation)
                        .property("noise-suppression", *noise_suppression)
                        .property("gain-control", *auto_gain_control)
                        .build()
                    {
                        Ok(dsp) => chain.push(dsp),
                        Err(e) => {
                            tracing::warn!(pipeline = %name, error = %e, "Voice processing unavailable; capturing unprocessed audio");
                        }
                    }
                }
                let element = gst::ElementFactory::make("volume")
                    .name(VOLUME_ELEMENT)
                    .build()
                    .map_err(|e| AvcalError::capture(format!("Failed to create volume: {e}")))?;
                volume = Some(element.clone());
                chain.push(element);
            }
        }

        let sink = gst::ElementFactory::make("fakesink")
            .property("sync", false)
            .build()
            .map_err(|e| AvcalError::capture(format!("Failed to create fakesink: {e}")))?;
        chain.push(sink);

        let pipeline = gst::Pipeline::with_name(&name);
        pipeline
            .add_many(&chain)
            .map_err(|e| AvcalError::capture(format!("Failed to assemble {name} pipeline: {e}")))?;
        gst::Element::link_many(&chain)
            .map_err(|e| AvcalError::capture(format!("Failed to link {name} pipeline: {e}")))?;

        Ok(Self {
            name,
            pipeline,
            volume,
            running: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drive the pipeline to `Playing`, blocking until the source is open.
    pub fn start(&self) -> AvcalResult<()> {
        if let Err(e) = self.pipeline.set_state(gst::State::Playing) {
            let err = self.take_bus_error().unwrap_or_else(|| {
                AvcalError::capture(format!("Failed to start {} pipeline: {e:?}", self.name))
            });
            self.reset();
            return Err(err);
        }

        match self
            .pipeline
            .state(gst::ClockTime::from_seconds(START_TIMEOUT_SECS))
        {
            (Ok(_), gst::State::Playing, _) => {}
            (Ok(_), state, _) => {
                tracing::warn!(
                    pipeline = %self.name,
                    ?state,
                    "Pipeline did not reach Playing state within timeout"
                );
            }
            (Err(e), _, _) => {
                let err = self.take_bus_error().unwrap_or_else(|| {
                    AvcalError::capture(format!(
                        "{} pipeline failed to reach Playing state: {e:?}",
                        self.name
                    ))
                });
                self.reset();
                return Err(err);
            }
        }

        // Sources may fail right after the state change completes.
        if let Some(err) = self.take_bus_error() {
            self.reset();
            return Err(err);
        }

        self.running.store(true, Ordering::SeqCst);
        tracing::debug!(pipeline = %self.name, "Pipeline playing");
        Ok(())
    }

    /// Release the device. Safe to call more than once.
    pub fn stop(&self) -> AvcalResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            AvcalError::capture(format!("Failed to stop {} pipeline: {e:?}", self.name))
        })?;
        tracing::debug!(pipeline = %self.name, "Pipeline stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.pipeline.current_state() == gst::State::Playing
    }

    /// Set the monitor volume in `[0, 100]`.
    pub fn set_volume(&self, volume: u8) -> AvcalResult<()> {
        let Some(element) = &self.volume else {
            return Err(AvcalError::unsupported(format!(
                "{} pipeline has no volume element",
                self.name
            )));
        };
        element.set_property("volume", volume_factor(volume));
        Ok(())
    }

    fn reset(&self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::debug!(pipeline = %self.name, error = ?e, "Failed to reset pipeline");
        }
    }

    fn take_bus_error(&self) -> Option<AvcalError> {
        let bus = self.pipeline.bus()?;
        let message = bus.pop_filtered(&[gst::MessageType::Error])?;
        match message.view() {
            gst::MessageView::Error(err) => {
                let debug = err.debug();
                tracing::debug!(
                    pipeline = %self.name,
                    error = %err.error(),
                    debug = ?debug,
                    "Pipeline reported an error"
                );
                Some(classify_error(
                    &err.error(),
                    debug.as_ref().map(|d| d.as_str()),
                ))
            }
            _ => None,
        }
    }
}

impl Drop for MonitorPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(pipeline = %self.name, error = %e, "Failed to stop pipeline on drop");
        }
    }
}

/// Map a GStreamer bus error to the stream-open failure it stands for.
pub fn classify_error(error: &gst::glib::Error, debug: Option<&str>) -> AvcalError {
    let message = error.message().to_string();

    if let Some(kind) = error.kind::<gst::ResourceError>() {
        return match kind {
            gst::ResourceError::NotAuthorized => AvcalError::permission_denied(message),
            gst::ResourceError::NotFound
            | gst::ResourceError::Busy
            | gst::ResourceError::OpenRead
            | gst::ResourceError::OpenWrite
            | gst::ResourceError::OpenReadWrite => AvcalError::device_unavailable(message),
            _ => AvcalError::capture(message),
        };
    }

    let negotiation = matches!(
        error.kind::<gst::CoreError>(),
        Some(gst::CoreError::Negotiation)
    ) || matches!(
        error.kind::<gst::StreamError>(),
        Some(gst::StreamError::Format)
    ) || debug.is_some_and(|d| d.contains("not-negotiated"));

    if negotiation {
        AvcalError::overconstrained(message)
    } else {
        AvcalError::capture(message)
    }
}

/// Frame size range advertised by a device's caps.
///
/// Fixed sizes and integer ranges are merged into one bounding range.
pub fn resolution_range(caps: &gst::CapsRef) -> Option<ResolutionRange> {
    let mut width: Option<(i32, i32)> = None;
    let mut height: Option<(i32, i32)> = None;

    for structure in caps.iter() {
        let (Some(w), Some(h)) = (int_bounds(structure, "width"), int_bounds(structure, "height"))
        else {
            continue;
        };
        width = Some(widen(width, w));
        height = Some(widen(height, h));
    }

    let ((w_min, w_max), (h_min, h_max)) = (width?, height?);
    Some(ResolutionRange {
        width: ParamRange::new(w_min as f64, w_max as f64, 1.0),
        height: ParamRange::new(h_min as f64, h_max as f64, 1.0),
    })
}

fn int_bounds(structure: &gst::StructureRef, field: &str) -> Option<(i32, i32)> {
    if let Ok(value) = structure.get::<i32>(field) {
        return Some((value, value));
    }
    structure
        .get::<gst::IntRange<i32>>(field)
        .ok()
        .map(|range| (range.min(), range.max()))
}

fn widen(acc: Option<(i32, i32)>, (min, max): (i32, i32)) -> (i32, i32) {
    match acc {
        Some((lo, hi)) => (lo.min(min), hi.max(max)),
        None => (min, max),
    }
}

fn volume_factor(volume: u8) -> f64 {
    f64::from(volume.min(100)) / 100.0
}

fn video_caps(resolution: Resolution, frame_rate: u32) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("width", resolution.width as i32)
        .field("height", resolution.height as i32)
        .field("framerate", gst::Fraction::new(frame_rate.max(1) as i32, 1))
        .build()
}

fn audio_caps(channels: u32, sample_rate: u32) -> gst::Caps {
    gst::Caps::builder("audio/x-raw")
        .field("channels", channels.max(1) as i32)
        .field("rate", sample_rate as i32)
        .build()
}

fn make_element(factory: &str) -> AvcalResult<gst::Element> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| AvcalError::capture(format!("Failed to create {factory}: {e}")))
}

fn capsfilter(caps: &gst::Caps) -> AvcalResult<gst::Element> {
    gst::ElementFactory::make("capsfilter")
        .property("caps", caps)
        .build()
        .map_err(|e| AvcalError::capture(format!("Failed to create capsfilter: {e}")))
}

pub(crate) fn init_gstreamer() -> AvcalResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(AvcalError::capture(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_map_to_open_failures() {
        let denied = gst::glib::Error::new(gst::ResourceError::NotAuthorized, "no access");
        assert!(matches!(
            classify_error(&denied, None),
            AvcalError::PermissionDenied { .. }
        ));

        let busy = gst::glib::Error::new(gst::ResourceError::Busy, "in use");
        assert!(matches!(
            classify_error(&busy, None),
            AvcalError::DeviceUnavailable { .. }
        ));
    }

    #[test]
    fn negotiation_errors_are_overconstrained() {
        let core = gst::glib::Error::new(gst::CoreError::Negotiation, "caps");
        assert!(matches!(
            classify_error(&core, None),
            AvcalError::Overconstrained { .. }
        ));

        let flow = gst::glib::Error::new(gst::StreamError::Failed, "Internal data stream error.");
        assert!(matches!(
            classify_error(&flow, Some("streaming stopped, reason not-negotiated (-4)")),
            AvcalError::Overconstrained { .. }
        ));
        assert!(matches!(
            classify_error(&flow, None),
            AvcalError::Capture { .. }
        ));
    }

    #[test]
    fn resolution_range_spans_all_structures() {
        init_gstreamer().unwrap();
        let mut caps = gst::Caps::builder("video/x-raw")
            .field("width", 640i32)
            .field("height", 480i32)
            .build();
        caps.make_mut().append_structure(
            gst::Structure::builder("image/jpeg")
                .field("width", gst::IntRange::new(160i32, 1920))
                .field("height", gst::IntRange::new(120i32, 1080))
                .build(),
        );

        let range = resolution_range(&caps).unwrap();
        assert_eq!((range.width.min, range.width.max), (160.0, 1920.0));
        assert_eq!((range.height.min, range.height.max), (120.0, 1080.0));
        assert_eq!(range.clamp(Resolution::HD), Resolution::HD);
    }

    #[test]
    fn caps_without_sizes_have_no_range() {
        init_gstreamer().unwrap();
        let caps = gst::Caps::builder("audio/x-raw").field("rate", 48000i32).build();
        assert!(resolution_range(&caps).is_none());
    }

    #[test]
    fn volume_is_a_linear_factor() {
        assert_eq!(volume_factor(0), 0.0);
        assert_eq!(volume_factor(50), 0.5);
        assert_eq!(volume_factor(250), 1.0);
    }
}
