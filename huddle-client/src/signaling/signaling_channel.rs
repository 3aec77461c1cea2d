use huddle_core::{ClientMessage, HuddleError, Result};
use tokio::sync::mpsc;

/// Outbound half of the signaling connection.
pub trait SignalingChannel: Send + Sync {
    fn send(&self, msg: ClientMessage) -> Result<()>;
}

impl SignalingChannel for mpsc::UnboundedSender<ClientMessage> {
    fn send(&self, msg: ClientMessage) -> Result<()> {
        mpsc::UnboundedSender::send(self, msg)
            .map_err(|_| HuddleError::signaling("signaling channel closed"))
    }
}
