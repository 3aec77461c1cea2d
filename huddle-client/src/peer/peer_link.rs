use crate::media::{LocalMediaState, LocalTrack, MediaKind, TrackId};
use crate::peer::{
    LinkCommand, LinkReport, LinkSnapshot, Negotiation, NegotiationInput, NegotiationState,
    PeerTransport, ReplaceOutcome, Role, SdpKind, TransportEvent, TransportState,
};
use crate::signaling::SignalingChannel;
use huddle_core::{IceCandidateInit, ParticipantId, Result, SignalMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// State shared by every link of one manager.
#[derive(Clone)]
pub(crate) struct LinkContext {
    pub local: ParticipantId,
    pub signaling: Arc<dyn SignalingChannel>,
    pub reports: mpsc::UnboundedSender<LinkReport>,
    pub negotiation_timeout: Duration,
}

/// Actor owning one peer connection. Commands and transport events are
/// processed strictly one at a time.
pub(crate) struct PeerLink {
    ctx: LinkContext,
    remote: ParticipantId,
    generation: u64,
    negotiation: Negotiation,
    transport: Arc<dyn PeerTransport>,
    initial_media: LocalMediaState,
    attached: BTreeMap<MediaKind, TrackId>,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidateInit>,
    renegotiation_pending: bool,
    close_reply: Option<oneshot::Sender<Result<()>>>,
    command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl PeerLink {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: LinkContext,
        remote: ParticipantId,
        generation: u64,
        role: Role,
        transport: Arc<dyn PeerTransport>,
        initial_media: LocalMediaState,
        command_rx: mpsc::UnboundedReceiver<LinkCommand>,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            ctx,
            remote,
            generation,
            negotiation: Negotiation::new(role),
            transport,
            initial_media,
            attached: BTreeMap::new(),
            remote_description_set: false,
            pending_candidates: Vec::new(),
            renegotiation_pending: false,
            close_reply: None,
            command_rx,
            transport_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            "Peer link to {} started as {:?} (generation {})",
            self.remote,
            self.negotiation.role(),
            self.generation
        );

        if let Err(e) = self.attach_initial_media().await {
            self.fail(format!("attaching local media: {e}"));
        }

        let deadline = tokio::time::sleep(self.ctx.negotiation_timeout);
        tokio::pin!(deadline);

        while !self.negotiation.state().is_terminal() {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(c) => self.handle_command(c).await,
                    None => {
                        debug!("Command channel of link {} closed", self.remote);
                        self.transition(NegotiationInput::Close, None);
                    }
                },

                evt = self.transport_rx.recv() => match evt {
                    Some(e) => self.handle_transport_event(e).await,
                    None => {
                        warn!("Transport of link {} stopped reporting", self.remote);
                        self.transition(NegotiationInput::Close, None);
                    }
                },

                _ = &mut deadline, if !self.negotiation.ever_connected() => {
                    warn!(
                        "Negotiation with {} did not complete within {:?}",
                        self.remote, self.ctx.negotiation_timeout
                    );
                    self.transition(
                        NegotiationInput::TimedOut,
                        Some("negotiation timed out".to_string()),
                    );
                }
            }

            self.renegotiate_if_needed().await;
        }

        let closed = self.transport.close().await;
        if let Err(e) = &closed {
            warn!("Failed to close transport of {}: {}", self.remote, e);
        }
        if let Some(reply) = self.close_reply.take() {
            let _ = reply.send(closed);
        }

        self.command_rx.close();
        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                LinkCommand::Close { reply } => {
                    let _ = reply.send(Ok(()));
                }
                other => warn!(
                    "Dropping {} for finished link to {}",
                    other.name(),
                    self.remote
                ),
            }
        }

        info!(
            "Peer link to {} finished in state {}",
            self.remote,
            self.negotiation.state()
        );
    }

    async fn attach_initial_media(&mut self) -> Result<()> {
        for kind in [MediaKind::Audio, MediaKind::Video] {
            let track = self.initial_media.outbound(kind).cloned();
            self.transport.add_media_line(kind, track.as_ref()).await?;
            if let Some(track) = track {
                self.attached.insert(kind, track.id());
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Offer => {
                if self.negotiation.can_offer() {
                    self.send_offer().await;
                } else {
                    self.renegotiation_pending = true;
                }
            }

            LinkCommand::RemoteOffer(sdp) => self.accept_offer(sdp).await,

            LinkCommand::RemoteAnswer(sdp) => self.accept_answer(sdp).await,

            LinkCommand::RemoteCandidate(candidate) => {
                if !self.remote_description_set {
                    debug!(
                        "Buffering ICE candidate from {} until the remote description is set",
                        self.remote
                    );
                    self.pending_candidates.push(candidate);
                    return;
                }
                if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate from {}: {}", self.remote, e);
                }
            }

            LinkCommand::ReplaceTrack { kind, track, reply } => {
                let result = self.replace_track(kind, track.as_ref()).await;
                let _ = reply.send(result);
            }

            LinkCommand::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
            }

            LinkCommand::Close { reply } => {
                self.close_reply = Some(reply);
                self.transition(NegotiationInput::Close, None);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalCandidate(candidate) => {
                self.signal(SignalMessage::IceCandidate {
                    from: self.ctx.local.clone(),
                    to: self.remote.clone(),
                    candidate,
                });
            }

            TransportEvent::StateChanged(state) => {
                info!("Transport to {} is now {:?}", self.remote, state);
                let reason = match state {
                    TransportState::Failed => Some("ICE connection failed".to_string()),
                    _ => None,
                };
                self.transition(NegotiationInput::Transport(state), reason);
            }

            TransportEvent::RemoteTrack(track) => {
                info!(
                    "Remote {:?} track {} from {}",
                    track.kind, track.id, self.remote
                );
                let _ = self.ctx.reports.send(LinkReport::RemoteTrack {
                    remote: self.remote.clone(),
                    generation: self.generation,
                    track,
                });
            }
        }
    }

    async fn send_offer(&mut self) {
        let sdp = match self.transport.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return self.fail(format!("creating offer: {e}")),
        };
        if !self.transition(NegotiationInput::LocalOffer, None) {
            return;
        }
        debug!("Sending offer to {}", self.remote);
        self.signal(SignalMessage::Offer {
            from: self.ctx.local.clone(),
            to: self.remote.clone(),
            sdp,
        });
    }

    async fn accept_offer(&mut self, sdp: String) {
        let colliding = self.negotiation.state() == NegotiationState::HaveLocalOffer;
        if colliding && !self.negotiation.role().is_polite() {
            warn!(
                "Ignoring offer from {} colliding with our own pending offer",
                self.remote
            );
            return;
        }
        if !self.transition(NegotiationInput::RemoteOffer, None) {
            warn!("Dropping unexpected offer from {}", self.remote);
            return;
        }

        if colliding {
            info!("Offer collision with {}, rolling back our offer", self.remote);
            if let Err(e) = self.transport.rollback().await {
                return self.fail(format!("rolling back local offer: {e}"));
            }
            self.renegotiation_pending = true;
        }

        if let Err(e) = self
            .transport
            .set_remote_description(SdpKind::Offer, sdp)
            .await
        {
            return self.fail(format!("applying remote offer: {e}"));
        }
        self.remote_description_applied().await;

        let answer = match self.transport.create_answer().await {
            Ok(sdp) => sdp,
            Err(e) => return self.fail(format!("creating answer: {e}")),
        };
        self.transition(NegotiationInput::LocalAnswer, None);
        debug!("Sending answer to {}", self.remote);
        self.signal(SignalMessage::Answer {
            from: self.ctx.local.clone(),
            to: self.remote.clone(),
            sdp: answer,
        });
    }

    async fn accept_answer(&mut self, sdp: String) {
        if self.negotiation.state() != NegotiationState::HaveLocalOffer {
            warn!(
                "Dropping answer from {} received in state {}",
                self.remote,
                self.negotiation.state()
            );
            return;
        }
        if let Err(e) = self
            .transport
            .set_remote_description(SdpKind::Answer, sdp)
            .await
        {
            return self.fail(format!("applying remote answer: {e}"));
        }
        self.remote_description_applied().await;
        self.transition(NegotiationInput::RemoteAnswer, None);
    }

    async fn remote_description_applied(&mut self) {
        self.remote_description_set = true;
        let buffered = std::mem::take(&mut self.pending_candidates);
        if buffered.is_empty() {
            return;
        }
        debug!(
            "Applying {} buffered ICE candidates from {}",
            buffered.len(),
            self.remote
        );
        for candidate in buffered {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate from {}: {}", self.remote, e);
            }
        }
    }

    async fn replace_track(&mut self, kind: MediaKind, track: Option<&LocalTrack>) -> Result<()> {
        let outcome = self.transport.replace_track(kind, track).await?;
        match track {
            Some(track) => self.attached.insert(kind, track.id()),
            None => self.attached.remove(&kind),
        };
        if outcome == ReplaceOutcome::RenegotiationRequired {
            info!(
                "Remote {} cannot take the new {:?} track in place, renegotiating",
                self.remote, kind
            );
            self.renegotiation_pending = true;
        }
        Ok(())
    }

    async fn renegotiate_if_needed(&mut self) {
        if self.renegotiation_pending && self.negotiation.state() == NegotiationState::Connected {
            self.renegotiation_pending = false;
            self.send_offer().await;
        }
    }

    fn signal(&mut self, msg: SignalMessage) {
        let kind = msg.kind();
        if let Err(e) = self.ctx.signaling.send(msg.into()) {
            self.fail(format!("sending {kind}: {e}"));
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("Peer link to {} failed: {}", self.remote, reason);
        self.transition(NegotiationInput::Fail, Some(reason));
    }

    fn transition(&mut self, input: NegotiationInput, reason: Option<String>) -> bool {
        let before = self.negotiation.state();
        match self.negotiation.apply(input) {
            Ok(state) => {
                if state != before {
                    debug!("Link {}: {} -> {}", self.remote, before, state);
                    let _ = self.ctx.reports.send(LinkReport::StateChanged {
                        remote: self.remote.clone(),
                        generation: self.generation,
                        state,
                        reason,
                    });
                }
                true
            }
            Err(e) => {
                debug!("Link {}: {}", self.remote, e);
                false
            }
        }
    }

    fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            remote: self.remote.clone(),
            state: self.negotiation.state(),
            attached: self.attached.clone(),
            pending_candidates: self.pending_candidates.len(),
            remote_description_set: self.remote_description_set,
        }
    }
}
