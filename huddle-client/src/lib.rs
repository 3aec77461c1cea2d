mod config;
pub mod media;
pub mod meeting;
pub mod peer;
pub mod rtc;
pub mod signaling;

pub use config::ClientConfig;
pub use media::{
    LocalMediaState, LocalTrack, MediaDevices, MediaKind, MediaPreferences, TrackController,
    TrackSource,
};
pub use meeting::{DepartureReason, Meeting, MeetingCommand, MeetingEvent, MeetingHandle};
pub use peer::{NegotiationState, PeerLinkManager, PeerTransport, PeerTransportFactory};
pub use signaling::{SignalingChannel, WsSignalingClient};
