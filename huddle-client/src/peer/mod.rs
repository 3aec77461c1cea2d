mod link_command;
mod link_manager;
mod negotiation;
mod peer_link;
mod transport;

pub use link_command::*;
pub use link_manager::*;
pub use negotiation::*;
pub use transport::*;
