use crate::registry::{Departure, Registry};
use crate::signaling::SignalingOutput;
use huddle_core::{
    ClientMessage, ConnectionId, IceServerConfig, ParticipantInfo, RoomEvent, RoomId, RoomRequest,
    ServerMessage, SignalMessage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An authenticated signaling connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub endpoint: ConnectionId,
    pub participant: ParticipantInfo,
}

impl Session {
    pub fn new(participant: ParticipantInfo) -> Self {
        Self {
            endpoint: ConnectionId::new(),
            participant,
        }
    }
}

/// Routes negotiation messages between room members and announces
/// membership changes. Never inspects negotiation payloads.
#[derive(Clone)]
pub struct Relay {
    registry: Arc<Registry>,
    output: Arc<dyn SignalingOutput>,
    ice_servers: Vec<IceServerConfig>,
}

impl Relay {
    pub fn new(
        registry: Arc<Registry>,
        output: Arc<dyn SignalingOutput>,
        ice_servers: Vec<IceServerConfig>,
    ) -> Self {
        Self {
            registry,
            output,
            ice_servers,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Greets a freshly authenticated connection.
    pub async fn on_connect(&self, session: &Session) {
        self.send(
            session.endpoint,
            RoomEvent::IceConfig {
                ice_servers: self.ice_servers.clone(),
            },
        )
        .await;
        self.send(
            session.endpoint,
            RoomEvent::Welcome {
                identity: session.participant.identity.clone(),
            },
        )
        .await;
    }

    pub async fn handle_message(&self, session: &Session, msg: ClientMessage) {
        match msg {
            ClientMessage::Room(RoomRequest::JoinRoom {
                room_id,
                display_name,
            }) => self.join(session, room_id, display_name).await,
            ClientMessage::Room(RoomRequest::LeaveRoom { room_id }) => {
                self.leave(session, room_id).await
            }
            ClientMessage::Signal(signal) => self.forward(session, signal).await,
        }
    }

    /// Transport-level disconnect: every membership of the endpoint is
    /// dropped and announced.
    pub async fn on_endpoint_closed(&self, endpoint: ConnectionId) {
        for departure in self.registry.on_endpoint_closed(endpoint) {
            info!(
                "Participant {} dropped from room {} (endpoint closed)",
                departure.participant.identity(),
                departure.room_id
            );
            self.announce_departure(departure).await;
        }
    }

    async fn join(&self, session: &Session, room_id: RoomId, display_name: Option<String>) {
        let mut participant = session.participant.clone();
        if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
            participant.display_name = name;
        }
        info!(
            "Participant {} ({}) joining room {}",
            participant.identity, participant.display_name, room_id
        );

        let outcome = self
            .registry
            .join(&room_id, participant.clone(), session.endpoint);

        // The snapshot is queued before anyone learns about the joiner, so it
        // reaches the joiner ahead of the first offer.
        self.send(
            session.endpoint,
            RoomEvent::ExistingParticipants {
                room_id: room_id.clone(),
                participants: outcome.existing.iter().map(|p| p.info.clone()).collect(),
            },
        )
        .await;

        for member in &outcome.existing {
            self.send(
                member.endpoint,
                RoomEvent::MemberJoined {
                    room_id: room_id.clone(),
                    participant: participant.clone(),
                },
            )
            .await;
        }
    }

    async fn leave(&self, session: &Session, room_id: RoomId) {
        let identity = &session.participant.identity;
        match self.registry.leave_from(&room_id, identity, session.endpoint) {
            Some(departure) => {
                info!("Participant {} left room {}", identity, room_id);
                self.announce_departure(departure).await;
            }
            None => debug!("Ignoring leave of {} from room {}", identity, room_id),
        }
    }

    async fn forward(&self, session: &Session, signal: SignalMessage) {
        if signal.sender() != &session.participant.identity {
            warn!(
                "Dropping {} claiming to be from {} on connection of {}",
                signal.kind(),
                signal.sender(),
                session.participant.identity
            );
            return;
        }

        let Some(target) = self.registry.route(session.endpoint, signal.recipient()) else {
            warn!(
                "Dropping {} from {}: peer unreachable: {}",
                signal.kind(),
                signal.sender(),
                signal.recipient()
            );
            return;
        };

        debug!(
            "Relaying {} {} -> {}",
            signal.kind(),
            signal.sender(),
            signal.recipient()
        );
        self.output.deliver(target, ServerMessage::Signal(signal)).await;
    }

    async fn announce_departure(&self, departure: Departure) {
        for member in &departure.remaining {
            self.send(
                member.endpoint,
                RoomEvent::MemberLeft {
                    room_id: departure.room_id.clone(),
                    identity: departure.participant.identity().clone(),
                },
            )
            .await;
        }
    }

    async fn send(&self, endpoint: ConnectionId, event: RoomEvent) {
        self.output.deliver(endpoint, event.into()).await;
    }
}
