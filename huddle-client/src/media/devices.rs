use crate::media::{LocalTrack, TrackSource};
use async_trait::async_trait;
use huddle_core::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    AudioInput,
    VideoInput,
    AudioOutput,
}

impl DeviceKind {
    fn fallback_prefix(&self) -> &'static str {
        match self {
            Self::AudioInput => "Microphone",
            Self::VideoInput => "Camera",
            Self::AudioOutput => "Speaker",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioInput => write!(f, "audioinput"),
            Self::VideoInput => write!(f, "videoinput"),
            Self::AudioOutput => write!(f, "audiooutput"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub kind: DeviceKind,
    /// Empty until the platform grants capture permission.
    pub label: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }

    /// The label, or `"<Kind> <first five id chars>..."` when the platform
    /// hides it.
    pub fn display_label(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        let short: String = self.id.chars().take(5).collect();
        format!("{} {}...", self.kind.fallback_prefix(), short)
    }
}

/// Platform capture seam.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Opens one capture track. `device_id == None` picks the platform
    /// default. Fails with `MediaUnavailable` when the device cannot be
    /// opened.
    async fn open(&self, source: TrackSource, device_id: Option<&str>) -> Result<LocalTrack>;
}
