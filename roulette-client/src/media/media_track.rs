use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: AtomicBool,
    live: AtomicBool,
}

/// Handle to one audio or video track. Clones share state.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                kind,
                label: label.into(),
                enabled: AtomicBool::new(true),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Mute/unmute without renegotiation.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Release the underlying device. A stopped track never restarts.
    pub fn stop(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
    }
}

/// Tracks captured from the local camera and microphone for one call attempt.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<MediaTrack>,
}

impl LocalMedia {
    pub fn new(stream_id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        self.tracks
            .iter()
            .filter(|track| track.kind() == kind)
            .for_each(|track| track.set_enabled(enabled));
    }

    pub fn stop_all(&self) {
        self.tracks.iter().for_each(MediaTrack::stop);
    }
}

/// Tracks received from the remote peer, filled in as they arrive.
#[derive(Debug, Clone, Default)]
pub struct RemoteMedia {
    tracks: Arc<Mutex<Vec<MediaTrack>>>,
}

impl RemoteMedia {
    pub async fn add(&self, track: MediaTrack) {
        self.tracks.lock().await.push(track);
    }

    pub async fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.lock().await.clone()
    }

    /// Stop and detach every remote track.
    pub async fn stop_all(&self) {
        for track in self.tracks.lock().await.drain(..) {
            track.stop();
        }
    }
}
