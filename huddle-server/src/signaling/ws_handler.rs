use crate::app::AppState;
use crate::signaling::Session;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use huddle_core::ClientMessage;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub token: String,
    pub display_name: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(participant) = state
        .identity
        .authenticate(&params.token, params.display_name.as_deref())
        .await
    else {
        warn!("Rejected WebSocket upgrade with invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let session = Session::new(participant);
    ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

async fn handle_socket(socket: WebSocket, session: Session, state: Arc<AppState>) {
    info!(
        "New WebSocket connection {} for {}",
        session.endpoint, session.participant.identity
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_endpoint(session.endpoint, tx);
    state.relay.on_connect(&session).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let session = session.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => state.relay.handle_message(&session, msg).await,
                        Err(e) => warn!(
                            "Invalid message from {}: {}",
                            session.participant.identity, e
                        ),
                    },
                    Message::Close(_) => break,
                    Message::Binary(_) => warn!(
                        "Ignoring binary frame from {}",
                        session.participant.identity
                    ),
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.relay.on_endpoint_closed(session.endpoint).await;
    state.signaling.remove_endpoint(&session.endpoint);
    info!(
        "WebSocket {} disconnected ({})",
        session.endpoint, session.participant.identity
    );
}
