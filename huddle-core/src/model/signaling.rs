use crate::model::participant::{ParticipantId, ParticipantInfo};
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Trickle ICE candidate in the shape browsers emit from `candidate.toJSON()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

/// Negotiation messages relayed between two clients. The server never looks
/// inside the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    Offer {
        from: ParticipantId,
        to: ParticipantId,
        sdp: String,
    },
    Answer {
        from: ParticipantId,
        to: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        from: ParticipantId,
        to: ParticipantId,
        candidate: IceCandidateInit,
    },
}

impl SignalMessage {
    pub fn sender(&self) -> &ParticipantId {
        match self {
            Self::Offer { from, .. } | Self::Answer { from, .. } | Self::IceCandidate { from, .. } => {
                from
            }
        }
    }

    pub fn recipient(&self) -> &ParticipantId {
        match self {
            Self::Offer { to, .. } | Self::Answer { to, .. } | Self::IceCandidate { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Room membership requests sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RoomRequest {
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        display_name: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
}

/// Events pushed by the server outside of peer-to-peer negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    Welcome {
        identity: ParticipantId,
    },
    ExistingParticipants {
        room_id: RoomId,
        participants: Vec<ParticipantInfo>,
    },
    MemberJoined {
        room_id: RoomId,
        participant: ParticipantInfo,
    },
    MemberLeft {
        room_id: RoomId,
        identity: ParticipantId,
    },
}

/// Every frame a client may send. Both halves share the `op` tag namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClientMessage {
    Room(RoomRequest),
    Signal(SignalMessage),
}

/// Every frame the server may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServerMessage {
    Room(RoomEvent),
    Signal(SignalMessage),
}

impl From<RoomRequest> for ClientMessage {
    fn from(req: RoomRequest) -> Self {
        Self::Room(req)
    }
}

impl From<SignalMessage> for ClientMessage {
    fn from(msg: SignalMessage) -> Self {
        Self::Signal(msg)
    }
}

impl From<RoomEvent> for ServerMessage {
    fn from(evt: RoomEvent) -> Self {
        Self::Room(evt)
    }
}

impl From<SignalMessage> for ServerMessage {
    fn from(msg: SignalMessage) -> Self {
        Self::Signal(msg)
    }
}
