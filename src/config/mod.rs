//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Default snapshot broadcast period
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 100;

/// Default per-peer outbound queue depth
pub const DEFAULT_PEER_OUTBOUND_CAPACITY: usize = 256;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (None = any origin)
    pub client_origin: Option<String>,
    /// Period of the `peers_state` broadcast
    pub broadcast_interval: Duration,
    /// Messages buffered per peer before further sends are dropped
    pub peer_outbound_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so hosted environments can inject it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let broadcast_interval_ms =
            parse_positive("BROADCAST_INTERVAL_MS", DEFAULT_BROADCAST_INTERVAL_MS)?;
        let peer_outbound_capacity =
            parse_positive("PEER_OUTBOUND_CAPACITY", DEFAULT_PEER_OUTBOUND_CAPACITY as u64)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN")
                .ok()
                .filter(|origins| !origins.trim().is_empty()),

            broadcast_interval: Duration::from_millis(broadcast_interval_ms),
            peer_outbound_capacity: peer_outbound_capacity as usize,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: None,
            broadcast_interval: Duration::from_millis(DEFAULT_BROADCAST_INTERVAL_MS),
            peer_outbound_capacity: DEFAULT_PEER_OUTBOUND_CAPACITY,
        }
    }
}

fn parse_positive(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid(name)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
