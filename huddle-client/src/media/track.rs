use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Microphone => MediaKind::Audio,
            Self::Camera | Self::Screen => MediaKind::Video,
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microphone => write!(f, "microphone"),
            Self::Camera => write!(f, "camera"),
            Self::Screen => write!(f, "screen"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub Uuid);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capture backend behind a [`LocalTrack`]: a native sample writer, a
/// browser track, or a test double.
pub trait TrackBackend: Send + Sync + 'static {
    /// Mutes or unmutes at the media layer. The track stays attached.
    fn set_enabled(&self, enabled: bool);

    /// Releases the capture device. Called at most once.
    fn stop(&self);

    fn as_any(&self) -> &dyn Any;
}

struct TrackInner {
    id: TrackId,
    source: TrackSource,
    device_id: Option<String>,
    label: String,
    enabled: AtomicBool,
    ended: watch::Sender<bool>,
    backend: Arc<dyn TrackBackend>,
}

/// A locally captured audio or video track.
///
/// Cloning is cheap and every clone refers to the same capture.
#[derive(Clone)]
pub struct LocalTrack {
    inner: Arc<TrackInner>,
}

impl LocalTrack {
    pub fn new(
        source: TrackSource,
        device_id: Option<String>,
        label: impl Into<String>,
        backend: Arc<dyn TrackBackend>,
    ) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackInner {
                id: TrackId(Uuid::new_v4()),
                source,
                device_id,
                label: label.into(),
                enabled: AtomicBool::new(true),
                ended,
                backend,
            }),
        }
    }

    pub fn id(&self) -> TrackId {
        self.inner.id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.source.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.inner.source
    }

    pub fn device_id(&self) -> Option<&str> {
        self.inner.device_id.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn backend(&self) -> &Arc<dyn TrackBackend> {
        &self.inner.backend
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
        self.inner.backend.set_enabled(enabled);
    }

    pub fn is_ended(&self) -> bool {
        *self.inner.ended.borrow()
    }

    /// Stops capture. Repeated calls are no-ops.
    pub fn stop(&self) {
        if self.inner.ended.send_replace(true) {
            return;
        }
        self.inner.backend.stop();
    }

    /// Marks the track as ended by the capture source itself, e.g. the user
    /// dismissed the system screen picker overlay.
    pub fn mark_ended(&self) {
        self.inner.ended.send_replace(true);
    }

    /// Resolves once the track has ended for any reason.
    pub async fn ended(&self) {
        let mut rx = self.inner.ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

impl PartialEq for LocalTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for LocalTrack {}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("label", &self.inner.label)
            .field("enabled", &self.is_enabled())
            .field("ended", &self.is_ended())
            .finish()
    }
}
