//! Relay core: peer registry, combat event fan-out, snapshot broadcast

pub mod events;
pub mod hub;
pub mod registry;
pub mod snapshot;

pub use hub::{RelayHandle, RelayHub};
pub use registry::{PeerEntry, PeerRegistry};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Per-peer outbound queue, drained by that peer's writer task
pub type Outbound = mpsc::Sender<ServerMsg>;

/// Connection lifecycle and traffic, as seen by the hub
#[derive(Debug)]
pub enum PeerEvent {
    /// Socket upgraded; the hub registers the peer and sends `welcome`
    Connected { peer_id: Uuid, outbound: Outbound },
    /// Decoded message from a connected peer
    Message {
        peer_id: Uuid,
        msg: ClientMsg,
        received_at: u64,
    },
    /// Socket closed or errored
    Disconnected { peer_id: Uuid },
}

/// Relay errors
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Peer already registered: {0}")]
    DuplicatePeer(Uuid),

    #[error("Relay hub is no longer running")]
    HubClosed,
}
