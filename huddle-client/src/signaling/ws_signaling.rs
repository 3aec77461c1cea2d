use crate::signaling::SignalingChannel;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, HuddleError, Result, ServerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// WebSocket connection to the signaling server.
pub struct WsSignalingClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WsSignalingClient {
    /// Connects to `base_url` (e.g. `ws://host:5000/ws`). Server messages
    /// arrive on the returned receiver, which closes when the socket does.
    pub async fn connect(
        base_url: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>)> {
        let url = connect_url(base_url, token, display_name)?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| HuddleError::signaling(format!("websocket connect failed: {e}")))?;
        info!("Connected to signaling server at {}", base_url);

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize signaling message: {}", e);
                        continue;
                    }
                };
                if ws_write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_write.send(Message::Close(None)).await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            if inbound_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid message from signaling server: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling websocket error: {}", e);
                        break;
                    }
                }
            }
            debug!("Signaling reader finished");
        });

        Ok((
            Self {
                outbound,
                writer,
                reader,
            },
            inbound,
        ))
    }

    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl SignalingChannel for WsSignalingClient {
    fn send(&self, msg: ClientMessage) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| HuddleError::signaling("websocket writer stopped"))
    }
}

impl Drop for WsSignalingClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Appends the identity query expected by the server's `/ws` route.
pub fn connect_url(base_url: &str, token: &str, display_name: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| HuddleError::signaling(format!("invalid signaling url {base_url}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", token);
        if let Some(name) = display_name {
            query.append_pair("displayName", name);
        }
    }
    Ok(url)
}
