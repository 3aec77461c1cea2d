use crate::peer::{NegotiationState, RemoteTrack};
use huddle_core::{HuddleError, ParticipantId, ParticipantInfo, RoomId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureReason {
    /// The server announced `member-left`.
    Left,
    /// The link reached `Disconnected` or `Closed`.
    Disconnected,
    Failed(HuddleError),
}

/// Everything the UI layer needs to render a meeting.
#[derive(Debug, Clone, PartialEq)]
pub enum MeetingEvent {
    /// Our join was accepted. `participants` were already present and will
    /// offer to us.
    Joined {
        room_id: RoomId,
        participants: Vec<ParticipantInfo>,
    },
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft {
        identity: ParticipantId,
        reason: DepartureReason,
    },
    LinkStateChanged {
        identity: ParticipantId,
        state: NegotiationState,
    },
    RemoteTrack {
        identity: ParticipantId,
        track: RemoteTrack,
    },
    ScreenShareStopped,
    Left {
        room_id: RoomId,
    },
}
