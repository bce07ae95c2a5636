//! Combat event fan-out
//!
//! Events are relayed verbatim. Nothing here checks speed, origin bounds or
//! whether an `enemy_fire` sender is actually the host.

use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{FireEvent, ServerMsg};

use super::PeerRegistry;

/// Relay a player volley as one `remote_fire` per shot to every other peer.
/// Returns the number of messages queued.
pub fn on_fire(registry: &PeerRegistry, origin: Uuid, shots: &[FireEvent]) -> usize {
    if !accept(registry, origin, shots, "fire") {
        return 0;
    }

    shots
        .iter()
        .map(|shot| registry.send_to_others(origin, &ServerMsg::RemoteFire(*shot)))
        .sum()
}

/// Relay an enemy volley to every peer, the origin included.
/// Returns the number of messages queued.
pub fn on_enemy_fire(registry: &PeerRegistry, origin: Uuid, shots: Vec<FireEvent>) -> usize {
    if !accept(registry, origin, &shots, "enemy_fire") {
        return 0;
    }

    registry.send_to_all(&ServerMsg::EnemyFire(shots))
}

fn accept(registry: &PeerRegistry, origin: Uuid, shots: &[FireEvent], kind: &str) -> bool {
    if shots.is_empty() {
        debug!(peer_id = %origin, kind, "Empty volley, dropping");
        return false;
    }
    if !registry.contains(&origin) {
        debug!(peer_id = %origin, kind, "Volley from unknown peer, dropping");
        return false;
    }
    true
}
