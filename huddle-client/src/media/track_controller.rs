use crate::media::{DeviceInfo, DeviceKind, LocalTrack, MediaDevices, MediaKind, TrackSource};
use huddle_core::{HuddleError, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Snapshot of everything captured locally.
#[derive(Debug, Clone, Default)]
pub struct LocalMediaState {
    pub audio: Option<LocalTrack>,
    /// Camera track. Kept alive while a screen share is active.
    pub video: Option<LocalTrack>,
    pub screen: Option<LocalTrack>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl LocalMediaState {
    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    /// Track that feeds the outbound line of `kind` on every link. A screen
    /// share takes precedence over the camera.
    pub fn outbound(&self, kind: MediaKind) -> Option<&LocalTrack> {
        match kind {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.screen.as_ref().or(self.video.as_ref()),
        }
    }

    fn tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        [&self.audio, &self.video, &self.screen]
            .into_iter()
            .filter_map(Option::as_ref)
    }
}

/// Devices remembered across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPreferences {
    pub audio_device: Option<String>,
    pub video_device: Option<String>,
}

/// A replacement track acquired but not yet published. Either
/// [`TrackController::commit_switch`] or [`TrackController::abort_switch`]
/// must consume it.
#[derive(Debug)]
pub struct PendingSwitch {
    pub kind: MediaKind,
    pub track: LocalTrack,
    pub previous: Option<LocalTrack>,
}

/// Owns local capture and publishes [`LocalMediaState`] to observers.
pub struct TrackController {
    devices: Arc<dyn MediaDevices>,
    state: watch::Sender<LocalMediaState>,
    preferences: MediaPreferences,
}

impl TrackController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        let (state, _) = watch::channel(LocalMediaState::default());
        Self {
            devices,
            state,
            preferences: MediaPreferences::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalMediaState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LocalMediaState {
        self.state.borrow().clone()
    }

    pub fn preferences(&self) -> &MediaPreferences {
        &self.preferences
    }

    /// Captures microphone and camera. Preferred devices that fail are
    /// retried with the defaults; a missing camera degrades to audio-only.
    /// Without a microphone nothing is kept.
    pub async fn acquire_local_media(
        &mut self,
        preferences: &MediaPreferences,
    ) -> Result<LocalMediaState> {
        {
            let current = self.state.borrow();
            if current.audio.is_some() {
                return Ok(current.clone());
            }
        }
        self.preferences = preferences.clone();

        let audio = match self
            .open_preferring(TrackSource::Microphone, preferences.audio_device.as_deref())
            .await
        {
            Ok(track) => track,
            Err(e) => {
                error!("Failed to access media devices: {}", e);
                return Err(into_unavailable(e));
            }
        };

        let video = match self
            .open_preferring(TrackSource::Camera, preferences.video_device.as_deref())
            .await
        {
            Ok(track) => Some(track),
            Err(e) => {
                warn!("Camera unavailable, continuing audio-only: {}", e);
                None
            }
        };

        info!(
            "Local media acquired: audio={} video={}",
            audio.label(),
            video.as_ref().map(LocalTrack::label).unwrap_or("none")
        );

        let state = LocalMediaState {
            audio: Some(audio),
            video_enabled: video.is_some(),
            video,
            screen: None,
            audio_enabled: true,
        };
        self.state.send_replace(state.clone());
        Ok(state)
    }

    async fn open_preferring(
        &self,
        source: TrackSource,
        preferred: Option<&str>,
    ) -> Result<LocalTrack> {
        if let Some(device_id) = preferred {
            match self.devices.open(source, Some(device_id)).await {
                Ok(track) => return Ok(track),
                Err(e) => warn!(
                    "Preferred {} {} failed ({}), retrying with the default device",
                    source, device_id, e
                ),
            }
        }
        self.devices.open(source, None).await
    }

    pub fn toggle_audio(&self, enabled: bool) {
        self.state.send_modify(|state| {
            state.audio_enabled = enabled;
            if let Some(track) = &state.audio {
                track.set_enabled(enabled);
            }
        });
    }

    pub fn toggle_video(&self, enabled: bool) {
        self.state.send_modify(|state| {
            state.video_enabled = enabled;
            if let Some(track) = &state.video {
                track.set_enabled(enabled);
            }
        });
    }

    /// Opens `device_id` as the future track of `kind`. The new track
    /// inherits the mute state of the one it replaces.
    pub async fn prepare_switch(&self, kind: MediaKind, device_id: &str) -> Result<PendingSwitch> {
        let acquired = self.state.borrow().audio.is_some();
        if !acquired {
            return Err(HuddleError::MediaUnavailable(
                "local media has not been acquired".to_string(),
            ));
        }

        let source = match kind {
            MediaKind::Audio => TrackSource::Microphone,
            MediaKind::Video => TrackSource::Camera,
        };
        let track = self
            .devices
            .open(source, Some(device_id))
            .await
            .map_err(into_unavailable)?;

        let state = self.state.borrow();
        let (previous, enabled) = match kind {
            MediaKind::Audio => (state.audio.clone(), state.audio_enabled),
            MediaKind::Video => (state.video.clone(), state.video_enabled),
        };
        track.set_enabled(enabled);

        Ok(PendingSwitch {
            kind,
            track,
            previous,
        })
    }

    /// Stops the replaced track, publishes the new one and remembers the
    /// device.
    pub fn commit_switch(&mut self, pending: PendingSwitch) -> LocalTrack {
        let PendingSwitch {
            kind,
            track,
            previous,
        } = pending;

        if let Some(old) = previous {
            old.stop();
        }

        let device = track.device_id().map(str::to_string);
        match kind {
            MediaKind::Audio => self.preferences.audio_device = device,
            MediaKind::Video => self.preferences.video_device = device,
        }

        self.state.send_modify(|state| match kind {
            MediaKind::Audio => state.audio = Some(track.clone()),
            MediaKind::Video => state.video = Some(track.clone()),
        });
        info!("Switched {:?} input to {}", kind, track.label());
        track
    }

    pub fn abort_switch(&self, pending: PendingSwitch) {
        warn!("Discarding replacement {:?} track {}", pending.kind, pending.track.label());
        pending.track.stop();
    }

    /// Opens a display capture without publishing it.
    pub async fn open_screen_share(&self) -> Result<LocalTrack> {
        self.devices
            .open(TrackSource::Screen, None)
            .await
            .map_err(into_unavailable)
    }

    pub fn commit_screen_share(&mut self, track: LocalTrack) {
        let mut replaced = None;
        self.state.send_modify(|state| replaced = state.screen.replace(track.clone()));
        if let Some(old) = replaced.filter(|old| *old != track) {
            old.stop();
        }
        info!("Screen share {} started", track.id());
    }

    /// Captures the screen. Returns the running share when one exists.
    pub async fn start_screen_share(&mut self) -> Result<LocalTrack> {
        let existing = self.state.borrow().screen.clone();
        if let Some(screen) = existing {
            return Ok(screen);
        }
        let track = self.open_screen_share().await?;
        self.commit_screen_share(track.clone());
        Ok(track)
    }

    /// Stops the share, leaving the camera as the outbound video. Returns the
    /// stopped track.
    pub fn stop_screen_share(&mut self) -> Option<LocalTrack> {
        let mut stopped = None;
        self.state.send_if_modified(|state| {
            stopped = state.screen.take();
            stopped.is_some()
        });
        if let Some(track) = &stopped {
            track.stop();
            info!("Screen share {} stopped", track.id());
        }
        stopped
    }

    /// Enumerates devices of one kind with display-ready labels. Enumeration
    /// failures yield an empty list.
    pub async fn list_devices(&self, kind: DeviceKind) -> Vec<DeviceInfo> {
        match self.devices.enumerate().await {
            Ok(devices) => devices
                .into_iter()
                .filter(|d| d.kind == kind)
                .map(|d| DeviceInfo {
                    label: d.display_label(),
                    ..d
                })
                .collect(),
            Err(e) => {
                error!("Error enumerating {} devices: {}", kind, e);
                Vec::new()
            }
        }
    }

    /// Stops every local track.
    pub fn release(&mut self) {
        let previous = self.state.send_replace(LocalMediaState::default());
        for track in previous.tracks() {
            track.stop();
        }
        info!("Local media released");
    }
}

fn into_unavailable(err: HuddleError) -> HuddleError {
    match err {
        err @ HuddleError::MediaUnavailable(_) => err,
        other => HuddleError::MediaUnavailable(other.to_string()),
    }
}
