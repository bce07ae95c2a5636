//! Snapshot building and broadcast

use tracing::trace;

use crate::ws::protocol::{PeerSnapshot, ServerMsg};

use super::PeerRegistry;

/// Builds full-state `peers_state` snapshots
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    /// Snapshots broadcast so far
    tick: u64,
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot message holding every registered peer.
    ///
    /// Always the complete set; nothing is diffed against the previous tick.
    pub fn build(&self, registry: &PeerRegistry) -> ServerMsg {
        let peers: Vec<PeerSnapshot> = registry
            .iter()
            .map(|(id, entry)| PeerSnapshot {
                id: *id,
                state: entry.state,
            })
            .collect();

        ServerMsg::PeersState(peers)
    }

    /// Build and send one snapshot to every peer, their own entry included.
    /// Returns the number of peers it was queued for.
    pub fn broadcast_tick(&mut self, registry: &PeerRegistry) -> usize {
        if registry.is_empty() {
            return 0;
        }

        let snapshot = self.build(registry);
        let delivered = registry.send_to_all(&snapshot);

        self.tick += 1;
        self.stats.record(registry.len(), delivered);
        trace!(tick = self.tick, peer_count = registry.len(), delivered, "Snapshot broadcast");

        delivered
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Snapshot delivery stats for debugging
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    /// Per-peer sends that were dropped (queue full or closed)
    pub dropped_sends: u64,
    pub avg_peers_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, peer_count: usize, delivered: usize) {
        self.total_snapshots += 1;
        self.dropped_sends += peer_count.saturating_sub(delivered) as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_peers_per_snapshot =
            self.avg_peers_per_snapshot * ((n - 1.0) / n) + (peer_count as f32 / n);
    }
}
