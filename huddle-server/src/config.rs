use huddle_core::IceServerConfig;
use huddle_core::utils::default_ice_servers;
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Handed to every client in `ice-config` on connect.
    pub ice_servers: Vec<IceServerConfig>,
    /// CORS origin allowed to open the WebSocket; any origin when unset.
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            ice_servers: default_ice_servers(),
            allowed_origin: None,
        }
    }
}
