use async_trait::async_trait;
use huddle_core::{ConnectionId, RoomEvent, ServerMessage, SignalMessage};
use huddle_server::SignalingOutput;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock SignalingOutput that records every delivery in order.
#[derive(Clone, Default)]
pub struct MockSignalingOutput {
    deliveries: Arc<Mutex<Vec<(ConnectionId, ServerMessage)>>>,
}

impl MockSignalingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered to `endpoint`, oldest first.
    pub async fn delivered_to(&self, endpoint: ConnectionId) -> Vec<ServerMessage> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|(to, _)| *to == endpoint)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub async fn room_events_for(&self, endpoint: ConnectionId) -> Vec<RoomEvent> {
        self.delivered_to(endpoint)
            .await
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Room(evt) => Some(evt),
                ServerMessage::Signal(_) => None,
            })
            .collect()
    }

    pub async fn signals_for(&self, endpoint: ConnectionId) -> Vec<SignalMessage> {
        self.delivered_to(endpoint)
            .await
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Signal(signal) => Some(signal),
                ServerMessage::Room(_) => None,
            })
            .collect()
    }

    pub async fn all_signals(&self) -> Vec<(ConnectionId, SignalMessage)> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|(to, msg)| match msg {
                ServerMessage::Signal(signal) => Some((*to, signal.clone())),
                ServerMessage::Room(_) => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.deliveries.lock().await.clear();
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn deliver(&self, endpoint: ConnectionId, msg: ServerMessage) {
        tracing::debug!("[MockSignaling] deliver to {}: {:?}", endpoint, msg);
        self.deliveries.lock().await.push((endpoint, msg));
    }
}
