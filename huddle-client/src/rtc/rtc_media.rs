use crate::media::{DeviceInfo, DeviceKind, LocalTrack, MediaDevices, TrackBackend, TrackSource};
use anyhow::Context;
use async_trait::async_trait;
use huddle_core::{HuddleError, Result};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "huddle";

/// Outbound track fed with encoded frames by the application's capture
/// pipeline.
pub struct SampleTrackBackend {
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl SampleTrackBackend {
    pub fn new(source: TrackSource) -> Self {
        let mime_type = match source {
            TrackSource::Microphone => MIME_TYPE_OPUS,
            TrackSource::Camera | TrackSource::Screen => MIME_TYPE_VP8,
        };
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_string(),
                ..Default::default()
            },
            format!("{}-{}", source, Uuid::new_v4()),
            STREAM_ID.to_string(),
        );
        Self {
            track: Arc::new(track),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// The backend of `track`, if it was opened by [`NativeMediaDevices`].
    pub fn of(track: &LocalTrack) -> Option<&SampleTrackBackend> {
        track.backend().as_any().downcast_ref::<SampleTrackBackend>()
    }

    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        self.track.clone()
    }

    /// Writes one encoded frame. Frames written while muted or after stop
    /// are dropped.
    pub async fn write_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        if self.stopped.load(Ordering::Acquire) || !self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        self.track
            .write_sample(sample)
            .await
            .context("Failed to write media sample")
    }
}

impl TrackBackend for SampleTrackBackend {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capture devices known to a native application.
#[derive(Debug, Clone, Default)]
pub struct NativeMediaDevices {
    devices: Vec<DeviceInfo>,
    screen_capture: bool,
}

impl NativeMediaDevices {
    pub fn new(devices: Vec<DeviceInfo>, screen_capture: bool) -> Self {
        Self {
            devices,
            screen_capture,
        }
    }

    fn find(&self, kind: DeviceKind, device_id: Option<&str>) -> Option<&DeviceInfo> {
        let mut candidates = self.devices.iter().filter(|d| d.kind == kind);
        match device_id {
            Some(id) => candidates.find(|d| d.id == id),
            None => candidates.next(),
        }
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    async fn open(&self, source: TrackSource, device_id: Option<&str>) -> Result<LocalTrack> {
        let (device_id, label) = match source {
            TrackSource::Screen if self.screen_capture => ("screen".to_string(), "Screen".to_string()),
            TrackSource::Screen => {
                return Err(HuddleError::MediaUnavailable(
                    "screen capture is not available".to_string(),
                ));
            }
            TrackSource::Microphone | TrackSource::Camera => {
                let kind = match source {
                    TrackSource::Microphone => DeviceKind::AudioInput,
                    _ => DeviceKind::VideoInput,
                };
                let device = self.find(kind, device_id).ok_or_else(|| {
                    HuddleError::MediaUnavailable(match device_id {
                        Some(id) => format!("{source} {id} not found"),
                        None => format!("no {source} available"),
                    })
                })?;
                (device.id.clone(), device.display_label())
            }
        };

        debug!("Opening {} {}", source, device_id);
        Ok(LocalTrack::new(
            source,
            Some(device_id),
            label,
            Arc::new(SampleTrackBackend::new(source)),
        ))
    }
}
