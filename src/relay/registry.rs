//! Peer registry - connected peers, their last reported state, host flag
//!
//! Owned exclusively by the hub task, so no internal locking. Every send goes
//! through `deliver`, which never blocks: a full queue drops the message for
//! that peer, a closed queue is left for the disconnect path to clean up.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{PeerState, ServerMsg, StateUpdate};

use super::{Outbound, RelayError};

/// Registry entry for one connected peer
#[derive(Debug)]
pub struct PeerEntry {
    pub state: PeerState,
    pub is_host: bool,
    outbound: Outbound,
}

/// All connected peers keyed by connection id
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<Uuid, PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer at the default spawn and send it `welcome`.
    ///
    /// The host flag is true only when this peer is alone right after
    /// insertion. A host that leaves is not replaced.
    pub fn on_connect(&mut self, peer_id: Uuid, outbound: Outbound) -> Result<bool, RelayError> {
        if self.peers.contains_key(&peer_id) {
            return Err(RelayError::DuplicatePeer(peer_id));
        }

        self.peers.insert(
            peer_id,
            PeerEntry {
                state: PeerState::default(),
                is_host: false,
                outbound,
            },
        );

        let is_host = self.peers.len() == 1;
        if let Some(entry) = self.peers.get_mut(&peer_id) {
            entry.is_host = is_host;
            deliver(peer_id, entry, ServerMsg::Welcome { id: peer_id, is_host });
        }

        info!(
            peer_id = %peer_id,
            is_host,
            peer_count = self.peers.len(),
            "Peer connected"
        );

        Ok(is_host)
    }

    /// Shallow-merge a partial state report. Unknown ids are ignored.
    pub fn on_state_update(&mut self, peer_id: Uuid, update: &StateUpdate) {
        match self.peers.get_mut(&peer_id) {
            Some(entry) => entry.state.apply(update),
            None => debug!(peer_id = %peer_id, "State update for unknown peer, ignoring"),
        }
    }

    /// Remove a peer and tell everyone left. Unknown ids emit nothing.
    pub fn on_disconnect(&mut self, peer_id: Uuid) -> Option<PeerEntry> {
        let entry = match self.peers.remove(&peer_id) {
            Some(entry) => entry,
            None => {
                debug!(peer_id = %peer_id, "Disconnect for unknown peer, ignoring");
                return None;
            }
        };

        self.send_to_all(&ServerMsg::PeerLeft { id: peer_id });

        info!(
            peer_id = %peer_id,
            was_host = entry.is_host,
            peer_count = self.peers.len(),
            "Peer disconnected"
        );

        if entry.is_host {
            warn!(peer_id = %peer_id, "Host left; no peer takes over enemy simulation");
        }

        Some(entry)
    }

    /// Send to a single peer. Returns false if the peer is unknown or the
    /// message was dropped.
    pub fn send_to(&self, peer_id: Uuid, msg: ServerMsg) -> bool {
        match self.peers.get(&peer_id) {
            Some(entry) => deliver(peer_id, entry, msg),
            None => false,
        }
    }

    /// Send to every peer; returns how many queues accepted it
    pub fn send_to_all(&self, msg: &ServerMsg) -> usize {
        self.send_filtered(msg, |_| true)
    }

    /// Send to every peer except `origin`
    pub fn send_to_others(&self, origin: Uuid, msg: &ServerMsg) -> usize {
        self.send_filtered(msg, |id| id != origin)
    }

    fn send_filtered(&self, msg: &ServerMsg, include: impl Fn(Uuid) -> bool) -> usize {
        self.peers
            .iter()
            .filter(|(id, _)| include(**id))
            .filter(|(id, entry)| deliver(**id, entry, msg.clone()))
            .count()
    }

    pub fn get(&self, peer_id: &Uuid) -> Option<&PeerEntry> {
        self.peers.get(peer_id)
    }

    pub fn contains(&self, peer_id: &Uuid) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Current host, if the host is still connected
    pub fn host_id(&self) -> Option<Uuid> {
        self.peers
            .iter()
            .find(|(_, entry)| entry.is_host)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &PeerEntry)> {
        self.peers.iter()
    }
}

fn deliver(peer_id: Uuid, entry: &PeerEntry, msg: ServerMsg) -> bool {
    match entry.outbound.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(peer_id = %peer_id, "Outbound queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(peer_id = %peer_id, "Outbound queue closed");
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ws::protocol::Weapon;
    use tokio::sync::mpsc;

    pub(crate) fn connect(registry: &mut PeerRegistry) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        registry.on_connect(id, tx).unwrap();
        (id, rx)
    }

    pub(crate) fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn connect_sends_welcome_with_default_spawn() {
        let mut registry = PeerRegistry::new();
        let (id, mut rx) = connect(&mut registry);

        assert_eq!(drain(&mut rx), vec![ServerMsg::Welcome { id, is_host: true }]);
        assert_eq!(registry.get(&id).unwrap().state, PeerState::default());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn only_first_peer_in_empty_registry_is_host() {
        let mut registry = PeerRegistry::new();
        let (a, mut rx_a) = connect(&mut registry);
        let (b, mut rx_b) = connect(&mut registry);

        assert_eq!(drain(&mut rx_a), vec![ServerMsg::Welcome { id: a, is_host: true }]);
        assert_eq!(drain(&mut rx_b), vec![ServerMsg::Welcome { id: b, is_host: false }]);
        assert_eq!(registry.host_id(), Some(a));
    }

    #[test]
    fn host_is_not_reelected_after_host_leaves() {
        let mut registry = PeerRegistry::new();
        let (a, _rx_a) = connect(&mut registry);
        let (b, _rx_b) = connect(&mut registry);

        registry.on_disconnect(a);
        assert_eq!(registry.host_id(), None);
        assert!(!registry.get(&b).unwrap().is_host);

        // A newcomer joining a non-empty registry is not host either.
        let (c, _rx_c) = connect(&mut registry);
        assert!(!registry.get(&c).unwrap().is_host);
        assert_eq!(registry.host_id(), None);

        // Only an empty registry hands out the flag again.
        registry.on_disconnect(b);
        registry.on_disconnect(c);
        let (d, _rx_d) = connect(&mut registry);
        assert_eq!(registry.host_id(), Some(d));
    }

    #[test]
    fn duplicate_connect_is_rejected() {
        let mut registry = PeerRegistry::new();
        let (a, _rx) = connect(&mut registry);
        let (tx, _rx2) = mpsc::channel(4);
        assert!(matches!(
            registry.on_connect(a, tx),
            Err(RelayError::DuplicatePeer(id)) if id == a
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn size_tracks_connects_minus_disconnects() {
        let mut registry = PeerRegistry::new();
        let mut live = Vec::new();
        let mut expected = 0usize;

        for step in 0..40 {
            if step % 3 == 2 {
                if let Some((id, _rx)) = live.pop() {
                    assert!(registry.on_disconnect(id).is_some());
                    expected -= 1;

                    // A repeated disconnect must not shrink the registry again.
                    assert!(registry.on_disconnect(id).is_none());
                    assert_eq!(registry.len(), expected);
                }
            } else {
                live.push(connect(&mut registry));
                expected += 1;
            }
            assert_eq!(registry.len(), expected);
        }
    }

    #[test]
    fn state_update_is_idempotent_and_partial() {
        let mut registry = PeerRegistry::new();
        let (a, _rx) = connect(&mut registry);
        let update = StateUpdate {
            x: Some(100.0),
            rot: Some(1.5),
            weapon: Some(Weapon::Shotgun),
            ..Default::default()
        };

        registry.on_state_update(a, &update);
        let once = registry.get(&a).unwrap().state;
        registry.on_state_update(a, &update);
        let twice = registry.get(&a).unwrap().state;

        assert_eq!(once, twice);
        assert_eq!(once.x, 100.0);
        assert_eq!(once.y, 320.0);
        assert_eq!(once.hp, 6);
        assert_eq!(once.weapon, Weapon::Shotgun);
    }

    #[test]
    fn state_update_for_unknown_peer_is_noop() {
        let mut registry = PeerRegistry::new();
        let (a, _rx) = connect(&mut registry);
        registry.on_state_update(
            Uuid::new_v4(),
            &StateUpdate {
                x: Some(1.0),
                ..Default::default()
            },
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&a).unwrap().state, PeerState::default());
    }

    #[test]
    fn disconnect_notifies_remaining_peers() {
        let mut registry = PeerRegistry::new();
        let (a, mut rx_a) = connect(&mut registry);
        let (b, mut rx_b) = connect(&mut registry);
        drain(&mut rx_a);
        drain(&mut rx_b);

        registry.on_disconnect(a);
        assert_eq!(drain(&mut rx_b), vec![ServerMsg::PeerLeft { id: a }]);
        assert!(drain(&mut rx_a).is_empty());
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
    }

    #[test]
    fn disconnect_of_unknown_peer_emits_nothing() {
        let mut registry = PeerRegistry::new();
        let (_a, mut rx_a) = connect(&mut registry);
        drain(&mut rx_a);

        assert!(registry.on_disconnect(Uuid::new_v4()).is_none());
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let mut registry = PeerRegistry::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        registry.on_connect(id, tx).unwrap();

        // Welcome occupies the only slot.
        assert!(!registry.send_to(id, ServerMsg::Pong { t: 1 }));
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(registry.send_to(id, ServerMsg::Pong { t: 2 }));
    }
}
