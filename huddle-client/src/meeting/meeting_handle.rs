use crate::media::{DeviceInfo, DeviceKind, LocalMediaState, LocalTrack, MediaKind, MediaPreferences};
use huddle_core::{HuddleError, Result, RoomId};
use tokio::sync::{mpsc, oneshot, watch};

/// Requests from the UI to a running [`Meeting`](crate::meeting::Meeting).
#[derive(Debug)]
pub enum MeetingCommand {
    Join {
        room_id: RoomId,
        display_name: Option<String>,
        preferences: MediaPreferences,
        reply: oneshot::Sender<Result<LocalMediaState>>,
    },
    Leave {
        reply: oneshot::Sender<Result<()>>,
    },
    ToggleAudio(bool),
    ToggleVideo(bool),
    SwitchDevice {
        kind: MediaKind,
        device_id: String,
        reply: oneshot::Sender<Result<LocalTrack>>,
    },
    ToggleScreenShare {
        reply: oneshot::Sender<Result<bool>>,
    },
    ListDevices {
        kind: DeviceKind,
        reply: oneshot::Sender<Vec<DeviceInfo>>,
    },
}

/// Cloneable front for a meeting running on its own task.
#[derive(Clone)]
pub struct MeetingHandle {
    commands: mpsc::Sender<MeetingCommand>,
    media: watch::Receiver<LocalMediaState>,
}

impl MeetingHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<MeetingCommand>,
        media: watch::Receiver<LocalMediaState>,
    ) -> Self {
        Self { commands, media }
    }

    /// Live view of local capture state.
    pub fn local_media(&self) -> watch::Receiver<LocalMediaState> {
        self.media.clone()
    }

    pub async fn join(
        &self,
        room_id: impl Into<RoomId>,
        display_name: Option<String>,
        preferences: MediaPreferences,
    ) -> Result<LocalMediaState> {
        let room_id = room_id.into();
        self.request(|reply| MeetingCommand::Join {
            room_id,
            display_name,
            preferences,
            reply,
        })
        .await?
    }

    pub async fn leave(&self) -> Result<()> {
        self.request(|reply| MeetingCommand::Leave { reply }).await?
    }

    pub async fn toggle_audio(&self, enabled: bool) -> Result<()> {
        self.send(MeetingCommand::ToggleAudio(enabled)).await
    }

    pub async fn toggle_video(&self, enabled: bool) -> Result<()> {
        self.send(MeetingCommand::ToggleVideo(enabled)).await
    }

    pub async fn switch_device(&self, kind: MediaKind, device_id: impl Into<String>) -> Result<LocalTrack> {
        let device_id = device_id.into();
        self.request(|reply| MeetingCommand::SwitchDevice {
            kind,
            device_id,
            reply,
        })
        .await?
    }

    /// Returns whether a screen share is running afterwards.
    pub async fn toggle_screen_share(&self) -> Result<bool> {
        self.request(|reply| MeetingCommand::ToggleScreenShare { reply })
            .await?
    }

    pub async fn list_devices(&self, kind: DeviceKind) -> Result<Vec<DeviceInfo>> {
        self.request(|reply| MeetingCommand::ListDevices { kind, reply })
            .await
    }

    async fn send(&self, cmd: MeetingCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| HuddleError::signaling("meeting loop stopped"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MeetingCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| HuddleError::signaling("meeting loop stopped"))
    }
}
