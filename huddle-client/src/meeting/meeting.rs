use crate::config::ClientConfig;
use crate::media::{
    DeviceInfo, DeviceKind, LocalMediaState, LocalTrack, MediaDevices, MediaKind, MediaPreferences,
    TrackController,
};
use crate::meeting::{DepartureReason, MeetingCommand, MeetingEvent, MeetingHandle};
use crate::peer::{LinkReport, NegotiationState, PeerLinkManager, PeerTransportFactory};
use crate::signaling::SignalingChannel;
use huddle_core::{
    HuddleError, ParticipantId, ParticipantInfo, Result, RoomEvent, RoomId, RoomRequest,
    ServerMessage,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Client-side meeting orchestrator. Drives the [`TrackController`] and the
/// [`PeerLinkManager`] from server events and UI commands.
pub struct Meeting {
    identity: ParticipantId,
    room: Option<RoomId>,
    participants: BTreeMap<ParticipantId, ParticipantInfo>,
    tracks: TrackController,
    links: PeerLinkManager,
    signaling: Arc<dyn SignalingChannel>,
    events: mpsc::UnboundedSender<MeetingEvent>,
}

impl Meeting {
    pub fn new(
        identity: impl Into<ParticipantId>,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn PeerTransportFactory>,
        signaling: Arc<dyn SignalingChannel>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MeetingEvent>) {
        let identity = identity.into();
        let tracks = TrackController::new(devices);
        let links = PeerLinkManager::new(
            identity.clone(),
            factory,
            signaling.clone(),
            tracks.subscribe(),
            config,
        );
        let (events, events_rx) = mpsc::unbounded_channel();

        let meeting = Self {
            identity,
            room: None,
            participants: BTreeMap::new(),
            tracks,
            links,
            signaling,
            events,
        };
        (meeting, events_rx)
    }

    pub fn identity(&self) -> &ParticipantId {
        &self.identity
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.participants.values().cloned().collect()
    }

    pub fn local_media(&self) -> LocalMediaState {
        self.tracks.state()
    }

    pub fn tracks(&self) -> &TrackController {
        &self.tracks
    }

    pub fn links(&self) -> &PeerLinkManager {
        &self.links
    }

    /// Acquires local media, then asks the server to join `room_id`. Already
    /// being in another room leaves it first.
    pub async fn join(
        &mut self,
        room_id: RoomId,
        display_name: Option<String>,
        preferences: &MediaPreferences,
    ) -> Result<LocalMediaState> {
        if let Some(current) = &self.room {
            if *current == room_id {
                return Ok(self.tracks.state());
            }
            self.leave().await?;
        }

        let media = self.tracks.acquire_local_media(preferences).await?;

        let request = RoomRequest::JoinRoom {
            room_id: room_id.clone(),
            display_name,
        };
        if let Err(e) = self.signaling.send(request.into()) {
            self.tracks.release();
            return Err(e);
        }

        info!("{} joining room {}", self.identity, room_id);
        self.room = Some(room_id);
        Ok(media)
    }

    /// Closes every link, releases local media and tells the server. Link and
    /// signaling failures are logged, not returned.
    pub async fn leave(&mut self) -> Result<()> {
        let Some(room_id) = self.room.take() else {
            return Err(HuddleError::NotInRoom);
        };

        let failures = self.links.close_all().await;
        if !failures.is_empty() {
            warn!("{} link(s) did not close cleanly", failures.len());
        }
        self.tracks.release();
        self.participants.clear();

        if let Err(e) = self.signaling.send(
            RoomRequest::LeaveRoom {
                room_id: room_id.clone(),
            }
            .into(),
        ) {
            warn!("Could not announce leaving {}: {}", room_id, e);
        }

        info!("{} left room {}", self.identity, room_id);
        self.emit(MeetingEvent::Left { room_id });
        Ok(())
    }

    /// Mutes in place. Links are untouched.
    pub fn toggle_audio(&self, enabled: bool) {
        self.tracks.toggle_audio(enabled);
    }

    pub fn toggle_video(&self, enabled: bool) {
        self.tracks.toggle_video(enabled);
    }

    /// Moves capture of `kind` to `device_id` on every link, or on none of
    /// them. A camera switch during a screen share only takes effect on
    /// links once the share stops.
    pub async fn switch_device(&mut self, kind: MediaKind, device_id: &str) -> Result<LocalTrack> {
        let pending = self.tracks.prepare_switch(kind, device_id).await?;

        let behind_screen = kind == MediaKind::Video && self.tracks.state().is_screen_sharing();
        if !behind_screen
            && let Err(e) = self
                .links
                .replace_track(kind, Some(&pending.track), pending.previous.as_ref())
                .await
        {
            self.tracks.abort_switch(pending);
            return Err(e);
        }

        Ok(self.tracks.commit_switch(pending))
    }

    /// Sends the screen instead of the camera on every link. Returns the
    /// running share if there already is one.
    pub async fn start_screen_share(&mut self) -> Result<LocalTrack> {
        let state = self.tracks.state();
        if let Some(screen) = state.screen {
            return Ok(screen);
        }

        let screen = self.tracks.open_screen_share().await?;
        if let Err(e) = self
            .links
            .replace_track(MediaKind::Video, Some(&screen), state.video.as_ref())
            .await
        {
            screen.stop();
            return Err(e);
        }

        self.tracks.commit_screen_share(screen.clone());
        Ok(screen)
    }

    /// Puts the camera back on every link and stops the share. A share whose
    /// capture already ended is cleared even if some link refuses the camera.
    pub async fn stop_screen_share(&mut self) -> Result<()> {
        let state = self.tracks.state();
        let Some(screen) = state.screen else {
            return Ok(());
        };

        if let Err(e) = self
            .links
            .replace_track(MediaKind::Video, state.video.as_ref(), Some(&screen))
            .await
        {
            if !screen.is_ended() {
                return Err(e);
            }
            warn!("Restoring the camera failed after the share ended: {}", e);
        }

        self.tracks.stop_screen_share();
        self.emit(MeetingEvent::ScreenShareStopped);
        Ok(())
    }

    pub async fn toggle_screen_share(&mut self) -> Result<bool> {
        if self.tracks.state().is_screen_sharing() {
            self.stop_screen_share().await?;
            Ok(false)
        } else {
            self.start_screen_share().await?;
            Ok(true)
        }
    }

    pub async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Room(event) => self.handle_room_event(event).await,
            ServerMessage::Signal(signal) => {
                if self.room.is_none() {
                    debug!("Ignoring {} outside of a room", signal.kind());
                    return;
                }
                let remote = signal.sender().clone();
                if let Err(e) = self.links.handle_signal(signal).await {
                    self.link_failed(remote, e);
                }
            }
        }
    }

    async fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::IceConfig { ice_servers } => {
                debug!("Received {} ICE server(s)", ice_servers.len());
                if !ice_servers.is_empty() {
                    self.links.set_ice_servers(ice_servers);
                }
            }

            RoomEvent::Welcome { identity } => {
                if identity != self.identity {
                    warn!(
                        "Server knows us as {} instead of {}, adopting it",
                        identity, self.identity
                    );
                    self.identity = identity.clone();
                    self.links.set_local(identity);
                }
            }

            RoomEvent::ExistingParticipants {
                room_id,
                participants,
            } => {
                if !self.in_room(&room_id) {
                    return;
                }
                info!(
                    "Joined room {} with {} participant(s) already present",
                    room_id,
                    participants.len()
                );
                // Members already present offer to us; we never offer to them.
                self.participants = participants
                    .iter()
                    .filter(|p| p.identity != self.identity)
                    .map(|p| (p.identity.clone(), p.clone()))
                    .collect();
                self.emit(MeetingEvent::Joined {
                    room_id,
                    participants,
                });
            }

            RoomEvent::MemberJoined {
                room_id,
                participant,
            } => {
                if !self.in_room(&room_id) || participant.identity == self.identity {
                    return;
                }
                info!("{} joined {}", participant.identity, room_id);
                let identity = participant.identity.clone();
                self.participants
                    .insert(identity.clone(), participant.clone());
                self.emit(MeetingEvent::ParticipantJoined(participant));

                if let Err(e) = self.links.connect_to(&identity).await {
                    self.link_failed(identity, e);
                }
            }

            RoomEvent::MemberLeft { room_id, identity } => {
                if !self.in_room(&room_id) {
                    return;
                }
                info!("{} left {}", identity, room_id);
                let known = self.participants.remove(&identity).is_some();
                if let Err(e) = self.links.close_link(&identity).await {
                    warn!("Failed to close link to {}: {}", identity, e);
                }
                // Already reported if the link failed first.
                if known {
                    self.emit(MeetingEvent::ParticipantLeft {
                        identity,
                        reason: DepartureReason::Left,
                    });
                }
            }
        }
    }

    pub fn handle_link_report(&mut self, report: LinkReport) {
        let Some(report) = self.links.handle_report(report) else {
            return;
        };

        match report {
            LinkReport::StateChanged {
                remote,
                state,
                reason,
                ..
            } => {
                self.emit(MeetingEvent::LinkStateChanged {
                    identity: remote.clone(),
                    state,
                });
                if !state.is_terminal() || self.participants.remove(&remote).is_none() {
                    return;
                }
                let reason = match state {
                    NegotiationState::Failed => DepartureReason::Failed(
                        HuddleError::NegotiationFailed {
                            peer: remote.clone(),
                            reason: reason.unwrap_or_else(|| "link failed".to_string()),
                        },
                    ),
                    _ => DepartureReason::Disconnected,
                };
                self.emit(MeetingEvent::ParticipantLeft {
                    identity: remote,
                    reason,
                });
            }

            LinkReport::RemoteTrack { remote, track, .. } => {
                self.emit(MeetingEvent::RemoteTrack {
                    identity: remote,
                    track,
                });
            }
        }
    }

    fn link_failed(&mut self, remote: ParticipantId, err: HuddleError) {
        warn!("Could not open a link to {}: {}", remote, err);
        if self.participants.remove(&remote).is_none() {
            return;
        }
        self.emit(MeetingEvent::ParticipantLeft {
            identity: remote.clone(),
            reason: DepartureReason::Failed(HuddleError::NegotiationFailed {
                peer: remote,
                reason: err.to_string(),
            }),
        });
    }

    fn in_room(&self, room_id: &RoomId) -> bool {
        if self.room.as_ref() == Some(room_id) {
            return true;
        }
        debug!("Ignoring event for room {} we are not in", room_id);
        false
    }

    fn emit(&self, event: MeetingEvent) {
        let _ = self.events.send(event);
    }

    /// Runs the meeting on its own task, fed by `inbound` server messages.
    pub fn spawn(
        self,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> (MeetingHandle, JoinHandle<()>) {
        let (commands, commands_rx) = mpsc::channel(32);
        let handle = MeetingHandle::new(commands, self.tracks.subscribe());
        let task = tokio::spawn(self.run(inbound, commands_rx));
        (handle, task)
    }

    /// Event loop: server messages, link reports, UI commands and the end of
    /// a screen capture are handled one at a time. Ends when the signaling
    /// connection or every handle goes away, leaving the room on the way out.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<ServerMessage>,
        mut commands: mpsc::Receiver<MeetingCommand>,
    ) {
        info!("Meeting loop started for {}", self.identity);

        loop {
            let screen = self.tracks.state().screen;

            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(m) => self.handle_server_message(m).await,
                    None => {
                        warn!("Signaling connection closed");
                        break;
                    }
                },

                Some(report) = self.links.next_report() => self.handle_link_report(report),

                cmd = commands.recv() => match cmd {
                    Some(c) => self.handle_command(c).await,
                    None => {
                        info!("All meeting handles dropped");
                        break;
                    }
                },

                _ = capture_ended(screen) => {
                    info!("Screen capture ended");
                    if let Err(e) = self.stop_screen_share().await {
                        warn!("Failed to stop screen share: {}", e);
                    }
                }
            }
        }

        if self.room.is_some()
            && let Err(e) = self.leave().await
        {
            warn!("Leaving on shutdown failed: {}", e);
        }
        info!("Meeting loop finished for {}", self.identity);
    }

    async fn handle_command(&mut self, cmd: MeetingCommand) {
        match cmd {
            MeetingCommand::Join {
                room_id,
                display_name,
                preferences,
                reply,
            } => {
                let result = self.join(room_id, display_name, &preferences).await;
                let _ = reply.send(result);
            }
            MeetingCommand::Leave { reply } => {
                let _ = reply.send(self.leave().await);
            }
            MeetingCommand::ToggleAudio(enabled) => self.toggle_audio(enabled),
            MeetingCommand::ToggleVideo(enabled) => self.toggle_video(enabled),
            MeetingCommand::SwitchDevice {
                kind,
                device_id,
                reply,
            } => {
                let _ = reply.send(self.switch_device(kind, &device_id).await);
            }
            MeetingCommand::ToggleScreenShare { reply } => {
                let _ = reply.send(self.toggle_screen_share().await);
            }
            MeetingCommand::ListDevices { kind, reply } => {
                let _ = reply.send(self.list_devices(kind).await);
            }
        }
    }

    pub async fn list_devices(&self, kind: DeviceKind) -> Vec<DeviceInfo> {
        self.tracks.list_devices(kind).await
    }
}

async fn capture_ended(track: Option<LocalTrack>) {
    match track {
        Some(track) => track.ended().await,
        None => std::future::pending().await,
    }
}
