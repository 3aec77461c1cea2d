use async_trait::async_trait;
use huddle_client::media::{DeviceInfo, DeviceKind, TrackBackend};
use huddle_client::{LocalTrack, MediaDevices, TrackSource};
use huddle_core::{HuddleError, Result};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct FakeBackend {
    pub stopped: AtomicBool,
}

impl TrackBackend for FakeBackend {
    fn set_enabled(&self, _enabled: bool) {}

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// In-memory capture devices.
#[derive(Debug, Clone, Default)]
pub struct FakeDevices {
    pub devices: Vec<DeviceInfo>,
    pub screen: bool,
}

impl FakeDevices {
    /// Two microphones, two cameras and screen capture.
    pub fn standard() -> Self {
        Self {
            devices: vec![
                DeviceInfo::new("mic-1", DeviceKind::AudioInput, "Mic 1"),
                DeviceInfo::new("mic-2", DeviceKind::AudioInput, "Mic 2"),
                DeviceInfo::new("cam-1", DeviceKind::VideoInput, "Cam 1"),
                DeviceInfo::new("cam-2", DeviceKind::VideoInput, "Cam 2"),
            ],
            screen: true,
        }
    }

    pub fn without_microphone() -> Self {
        let mut devices = Self::standard();
        devices.devices.retain(|d| d.kind != DeviceKind::AudioInput);
        devices
    }

    pub fn shared(self) -> Arc<dyn MediaDevices> {
        Arc::new(self)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    async fn open(&self, source: TrackSource, device_id: Option<&str>) -> Result<LocalTrack> {
        let kind = match source {
            TrackSource::Microphone => DeviceKind::AudioInput,
            TrackSource::Camera => DeviceKind::VideoInput,
            TrackSource::Screen if self.screen => {
                return Ok(LocalTrack::new(
                    source,
                    None,
                    "screen",
                    Arc::new(FakeBackend::default()),
                ));
            }
            TrackSource::Screen => {
                return Err(HuddleError::MediaUnavailable("no screen".into()));
            }
        };

        let mut candidates = self.devices.iter().filter(|d| d.kind == kind);
        let device = match device_id {
            Some(id) => candidates.find(|d| d.id == id),
            None => candidates.next(),
        }
        .ok_or_else(|| HuddleError::MediaUnavailable(format!("no {source}")))?;

        Ok(LocalTrack::new(
            source,
            Some(device.id.clone()),
            device.label.clone(),
            Arc::new(FakeBackend::default()),
        ))
    }
}
