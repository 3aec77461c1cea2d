use async_trait::async_trait;
use huddle_core::{ConnectionId, ServerMessage};

/// Outbound half of the signaling transport. Implemented by the WebSocket
/// service, and by test doubles that capture deliveries.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue `msg` for `endpoint`. Messages to the same endpoint are
    /// delivered in call order.
    async fn deliver(&self, endpoint: ConnectionId, msg: ServerMessage);
}
