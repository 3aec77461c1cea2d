use huddle_core::IceServerConfig;
use huddle_core::utils::default_ice_servers;
use std::time::Duration;

/// How long a link may take to reach `Connected` before it is failed.
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Used until the server sends its own `ice-config`.
    pub ice_servers: Vec<IceServerConfig>,
    pub negotiation_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
        }
    }
}
