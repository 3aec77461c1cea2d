use crate::media::{LocalTrack, MediaKind, TrackId};
use crate::peer::{NegotiationState, RemoteTrack};
use huddle_core::{IceCandidateInit, ParticipantId, Result};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

/// Commands a [`PeerLinkManager`](crate::peer::PeerLinkManager) sends to a
/// link task.
#[derive(Debug)]
pub enum LinkCommand {
    /// Start the initial negotiation as offerer.
    Offer,

    RemoteOffer(String),

    RemoteAnswer(String),

    RemoteCandidate(IceCandidateInit),

    ReplaceTrack {
        kind: MediaKind,
        track: Option<LocalTrack>,
        reply: oneshot::Sender<Result<()>>,
    },

    Inspect {
        reply: oneshot::Sender<LinkSnapshot>,
    },

    /// Move to `Closed` and release the transport. The reply carries the
    /// result of closing it.
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

impl LinkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offer => "offer request",
            Self::RemoteOffer(_) => "offer",
            Self::RemoteAnswer(_) => "answer",
            Self::RemoteCandidate(_) => "ice-candidate",
            Self::ReplaceTrack { .. } => "track replacement",
            Self::Inspect { .. } => "inspection",
            Self::Close { .. } => "close request",
        }
    }
}

/// What a link task tells its manager. `generation` identifies the link
/// instance so reports from a replaced link can be ignored.
#[derive(Debug, Clone)]
pub enum LinkReport {
    StateChanged {
        remote: ParticipantId,
        generation: u64,
        state: NegotiationState,
        /// Set when the link failed.
        reason: Option<String>,
    },
    RemoteTrack {
        remote: ParticipantId,
        generation: u64,
        track: RemoteTrack,
    },
}

impl LinkReport {
    pub fn remote(&self) -> &ParticipantId {
        match self {
            Self::StateChanged { remote, .. } | Self::RemoteTrack { remote, .. } => remote,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Self::StateChanged { generation, .. } | Self::RemoteTrack { generation, .. } => {
                *generation
            }
        }
    }
}

/// Point-in-time view of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub remote: ParticipantId,
    pub state: NegotiationState,
    pub attached: BTreeMap<MediaKind, TrackId>,
    pub pending_candidates: usize,
    pub remote_description_set: bool,
}
