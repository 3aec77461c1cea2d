use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::signaling::{IdentityProvider, Relay, SignalingService, TokenIdentity, ws_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

pub struct AppState {
    pub signaling: SignalingService,
    pub relay: Relay,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(config: &ServerConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let signaling = SignalingService::new();
        let relay = Relay::new(
            Arc::new(Registry::new()),
            Arc::new(signaling.clone()),
            config.ice_servers.clone(),
        );
        Self {
            signaling,
            relay,
            identity,
        }
    }
}

pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Result<Router> {
    let origin = match &config.allowed_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin}"))?,
        ),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .with_state(state))
}

/// Serves the signaling endpoint on an already bound listener until the task
/// is cancelled.
pub async fn serve_on(
    listener: TcpListener,
    config: &ServerConfig,
    identity: Arc<dyn IdentityProvider>,
) -> Result<()> {
    let state = Arc::new(AppState::new(config, identity));
    let app = build_router(state, config)?;

    info!(
        "Signaling server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await.context("Server error")
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    serve_on(listener, &config, Arc::new(TokenIdentity)).await
}
