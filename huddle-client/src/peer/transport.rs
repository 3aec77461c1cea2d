use crate::media::{LocalTrack, MediaKind};
use async_trait::async_trait;
use huddle_core::{IceCandidateInit, IceServerConfig, ParticipantId, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connectivity of the underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A media track received from the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    LocalCandidate(IceCandidateInit),
    StateChanged(TransportState),
    RemoteTrack(RemoteTrack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Swapped on the existing media line.
    Replaced,
    /// The remote cannot accept the track as negotiated; the line was
    /// rebuilt and a new offer is needed.
    RenegotiationRequired,
}

/// One peer connection. Implementations report asynchronous happenings
/// through the event sender handed to [`PeerTransportFactory::create`].
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Adds the outbound line for `kind`. Without a track the line is still
    /// negotiated so remote media can be received.
    async fn add_media_line(&self, kind: MediaKind, track: Option<&LocalTrack>) -> Result<()>;

    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Creates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    /// Drops a pending local offer.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()>;

    async fn replace_track(
        &self,
        kind: MediaKind,
        track: Option<&LocalTrack>,
    ) -> Result<ReplaceOutcome>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    async fn create(
        &self,
        remote: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
