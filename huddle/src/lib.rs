pub use huddle_core::model::{ParticipantId, RoomId};
pub use huddle_core::{HuddleError, Result};

pub mod model {
    pub use huddle_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use huddle_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use huddle_client::*;
}
