//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::relay::{RelayHandle, RelayHub};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: RelayHandle,
}

impl AppState {
    /// Build the state and the hub it talks to. The caller spawns the hub.
    pub fn new(config: Config) -> (Self, RelayHub) {
        let config = Arc::new(config);

        let (hub, relay) = RelayHub::new(config.broadcast_interval, config.peer_outbound_capacity);

        (Self { config, relay }, hub)
    }
}
