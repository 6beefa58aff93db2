//! Per-session table of open streams and the current selection.
//!
//! The registry never owns a stream. Entries are weak references to streams
//! held by the [`AcquisitionEngine`](crate::acquisition::AcquisitionEngine).

use std::sync::{Arc, Weak};

use avcal_common::error::{AvcalError, AvcalResult};
use avcal_device_model::MediaKind;

use crate::backend::{CaptureStream, TrackInfo};

/// Selected camera and microphone merged for hand-off to a consumer.
#[derive(Clone)]
pub struct CombinedStream {
    pub video: Arc<dyn CaptureStream>,
    pub audio: Arc<dyn CaptureStream>,
}

impl CombinedStream {
    /// Video tracks first, then audio tracks.
    pub fn tracks(&self) -> Vec<TrackInfo> {
        let mut tracks = self.video.tracks();
        tracks.extend(self.audio.tracks());
        tracks
    }

    pub fn is_live(&self) -> bool {
        self.video.is_live() && self.audio.is_live()
    }
}

impl std::fmt::Debug for CombinedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedStream")
            .field("video", &self.video.device_id())
            .field("audio", &self.audio.device_id())
            .finish()
    }
}

#[derive(Default)]
struct KindTable {
    entries: Vec<(String, Weak<dyn CaptureStream>)>,
    selected: Option<String>,
}

impl KindTable {
    fn get(&self, device_id: &str) -> Option<Arc<dyn CaptureStream>> {
        self.entries
            .iter()
            .find(|(id, _)| id == device_id)
            .and_then(|(_, stream)| stream.upgrade())
    }
}

/// Device id to stream lookups, one table per media kind.
#[derive(Default)]
pub struct SessionRegistry {
    video: KindTable,
    audio: KindTable,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: MediaKind) -> &KindTable {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    fn table_mut(&mut self, kind: MediaKind) -> &mut KindTable {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Record a stream under its device id and kind. Re-registering an id
    /// replaces the entry in place.
    pub fn register(&mut self, stream: &Arc<dyn CaptureStream>) {
        let device_id = stream.device_id().to_string();
        let table = self.table_mut(stream.kind());
        let weak = Arc::downgrade(stream);
        match table.entries.iter_mut().find(|(id, _)| *id == device_id) {
            Some(entry) => entry.1 = weak,
            None => table.entries.push((device_id, weak)),
        }
    }

    /// Live stream registered for `device_id`.
    pub fn stream(&self, kind: MediaKind, device_id: &str) -> Option<Arc<dyn CaptureStream>> {
        self.table(kind).get(device_id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self, kind: MediaKind) -> Vec<&str> {
        self.table(kind)
            .entries
            .iter()
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn first_id(&self, kind: MediaKind) -> Option<&str> {
        self.table(kind).entries.first().map(|(id, _)| id.as_str())
    }

    pub fn len(&self, kind: MediaKind) -> usize {
        self.table(kind).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.video.entries.is_empty() && self.audio.entries.is_empty()
    }

    /// Select a registered device.
    pub fn select(&mut self, kind: MediaKind, device_id: &str) -> AvcalResult<()> {
        let table = self.table_mut(kind);
        if !table.entries.iter().any(|(id, _)| id == device_id) {
            return Err(AvcalError::invalid_state(format!(
                "No {kind} device {device_id} in this session"
            )));
        }
        table.selected = Some(device_id.to_string());
        tracing::debug!(%kind, device_id, "Device selected");
        Ok(())
    }

    pub fn selected_id(&self, kind: MediaKind) -> Option<&str> {
        self.table(kind).selected.as_deref()
    }

    pub fn selected_stream(&self, kind: MediaKind) -> Option<Arc<dyn CaptureStream>> {
        let table = self.table(kind);
        table.selected.as_deref().and_then(|id| table.get(id))
    }

    /// First video track of the selected camera.
    pub fn selected_video_track(&self) -> Option<TrackInfo> {
        self.selected_stream(MediaKind::Video)?
            .tracks()
            .into_iter()
            .find(|track| track.kind == MediaKind::Video)
    }

    /// Selected camera and microphone as one stream. `None` unless both are
    /// selected and still alive.
    pub fn combined_selection(&self) -> Option<CombinedStream> {
        Some(CombinedStream {
            video: self.selected_stream(MediaKind::Video)?,
            audio: self.selected_stream(MediaKind::Audio)?,
        })
    }

    /// Forget every entry and selection. Streams are not stopped here.
    pub fn clear(&mut self) {
        self.video = KindTable::default();
        self.audio = KindTable::default();
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("video", &self.ids(MediaKind::Video))
            .field("audio", &self.ids(MediaKind::Audio))
            .field("selected_video", &self.video.selected)
            .field("selected_audio", &self.audio.selected)
            .finish()
    }
}
