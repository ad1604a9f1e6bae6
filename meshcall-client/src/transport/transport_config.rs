use crate::config::ClientConfig;
use meshcall_core::IceServerConfig;

/// ICE setup for every peer connection the factory builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for TransportConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
        }
    }
}

impl TransportConfig {
    /// No ICE servers: host candidates only. Enough for in-process peers.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}
