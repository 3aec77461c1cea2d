mod connection;
mod participant;
mod room;
mod signaling;

pub use connection::ConnectionId;
pub use participant::{ParticipantId, ParticipantInfo};
pub use room::RoomId;
pub use signaling::{
    ClientMessage, IceCandidateInit, IceServerConfig, RoomEvent, RoomRequest, ServerMessage,
    SignalMessage,
};
