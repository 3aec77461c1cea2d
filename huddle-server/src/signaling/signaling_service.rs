use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use huddle_core::{ConnectionId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    endpoints: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

/// Table of live WebSocket connections, each fed by its own FIFO queue.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                endpoints: DashMap::new(),
            }),
        }
    }

    pub fn add_endpoint(&self, endpoint: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.endpoints.insert(endpoint, tx);
    }

    pub fn remove_endpoint(&self, endpoint: &ConnectionId) {
        self.inner.endpoints.remove(endpoint);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.endpoints.len()
    }

    fn send_signal(&self, endpoint: ConnectionId, msg: &ServerMessage) {
        let Some(tx) = self.inner.endpoints.get(&endpoint) else {
            warn!("Attempted to send signal to closed endpoint {}", endpoint);
            return;
        };
        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = tx.send(Message::Text(json.into())) {
                    error!("Failed to queue WS message for {}: {:?}", endpoint, e);
                }
            }
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(&self, endpoint: ConnectionId, msg: ServerMessage) {
        self.send_signal(endpoint, &msg);
    }
}
