use crate::model::{ParticipantId, RoomId};
use std::fmt::Display;
use thiserror::Error;

/// Failures shared by the signaling server and the meeting client.
///
/// Only `MediaUnavailable`, `Transport`, `Signaling` and `NotInRoom` are ever
/// returned to a caller. The remaining kinds are observed indirectly:
/// `PeerUnreachable` is logged by the relay, `NegotiationFailed` is reported as
/// a departed participant, and `RegistryInconsistency` is a silent no-op.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HuddleError {
    /// No usable capture device, even after degrading to audio only.
    #[error("media unavailable: {0}")]
    MediaUnavailable(String),

    /// The relay could not resolve the destination of a signal.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(ParticipantId),

    /// ICE or the peer connection reached a terminal failed state.
    #[error("negotiation with {peer} failed: {reason}")]
    NegotiationFailed { peer: ParticipantId, reason: String },

    /// Leave for a room/identity pair that is not registered.
    #[error("participant {identity} is not registered in room {room}")]
    RegistryInconsistency { room: RoomId, identity: ParticipantId },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("not in a room")]
    NotInRoom,
}

impl HuddleError {
    pub fn transport(err: impl Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn signaling(err: impl Display) -> Self {
        Self::Signaling(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HuddleError>;
