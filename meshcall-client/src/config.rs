use meshcall_core::IceServerConfig;
use meshcall_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// Client-wide settings. Every field has a default so partial config files work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the signaling server; `/ws/{meeting}/{participant}` is appended.
    pub server_url: String,
    pub reconnect_delay_ms: u64,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            ice_servers: vec![
                IceServerConfig {
                    urls: vec![DEFAULT_STUN_ADDR.to_owned()],
                    username: None,
                    credential: None,
                },
                IceServerConfig {
                    urls: vec![DEFAULT_STUN_ADDR_2.to_owned()],
                    username: None,
                    credential: None,
                },
            ],
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `MESHCALL_SERVER_URL`, `PORT` (local server port)
    /// and `MESHCALL_RECONNECT_DELAY_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("MESHCALL_SERVER_URL") {
            config.server_url = url;
        } else if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.server_url = format!("ws://localhost:{}", port),
                Err(e) => warn!("Ignoring invalid PORT '{}': {}", port, e),
            }
        }

        if let Some(delay) = lookup("MESHCALL_RECONNECT_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => config.reconnect_delay_ms = ms,
                Err(e) => warn!("Ignoring invalid MESHCALL_RECONNECT_DELAY_MS '{}': {}", delay, e),
            }
        }

        config
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
