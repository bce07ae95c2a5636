//! Relay hub - the single event loop that owns the peer registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::events::{on_enemy_fire, on_fire};
use super::snapshot::SnapshotBuilder;
use super::{Outbound, PeerEvent, PeerRegistry, RelayError};

/// Inbox depth for connection events
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Shortest accepted broadcast period; `interval` panics on zero
const MIN_BROADCAST_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to the running hub, cloned into every connection
#[derive(Clone, Debug)]
pub struct RelayHandle {
    event_tx: mpsc::Sender<PeerEvent>,
    peer_count: Arc<AtomicUsize>,
    outbound_capacity: usize,
}

impl RelayHandle {
    /// Number of peers currently registered
    pub fn peer_count(&self) -> usize {
        self.peer_count.load(Ordering::Relaxed)
    }

    /// Register a new connection. Returns its id and the queue the hub will
    /// write to; `welcome` is the first message on it.
    pub async fn connect(&self) -> Result<(Uuid, mpsc::Receiver<ServerMsg>), RelayError> {
        let peer_id = Uuid::new_v4();
        let (outbound, outbound_rx) = mpsc::channel(self.outbound_capacity);
        self.send(PeerEvent::Connected { peer_id, outbound }).await?;
        Ok((peer_id, outbound_rx))
    }

    /// Forward a decoded client message
    pub async fn message(&self, peer_id: Uuid, msg: ClientMsg) -> Result<(), RelayError> {
        self.send(PeerEvent::Message {
            peer_id,
            msg,
            received_at: unix_millis(),
        })
        .await
    }

    pub async fn disconnect(&self, peer_id: Uuid) -> Result<(), RelayError> {
        self.send(PeerEvent::Disconnected { peer_id }).await
    }

    async fn send(&self, event: PeerEvent) -> Result<(), RelayError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RelayError::HubClosed)
    }
}

/// The relay event loop. Owns the registry; nothing else touches it.
pub struct RelayHub {
    registry: PeerRegistry,
    event_rx: mpsc::Receiver<PeerEvent>,
    snapshot_builder: SnapshotBuilder,
    broadcast_interval: Duration,
    peer_count: Arc<AtomicUsize>,
}

impl RelayHub {
    /// Create a hub and its handle
    pub fn new(broadcast_interval: Duration, outbound_capacity: usize) -> (Self, RelayHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let peer_count = Arc::new(AtomicUsize::new(0));

        let handle = RelayHandle {
            event_tx,
            peer_count: peer_count.clone(),
            outbound_capacity: outbound_capacity.max(1),
        };

        let hub = Self {
            registry: PeerRegistry::new(),
            event_rx,
            snapshot_builder: SnapshotBuilder::new(),
            broadcast_interval: broadcast_interval.max(MIN_BROADCAST_INTERVAL),
            peer_count,
        };

        (hub, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(
            interval_ms = self.broadcast_interval.as_millis() as u64,
            "Relay hub started"
        );

        let mut tick_interval = interval(self.broadcast_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.snapshot_builder.broadcast_tick(&self.registry);
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }

        let stats = self.snapshot_builder.stats();
        info!(
            snapshots = stats.total_snapshots,
            dropped_sends = stats.dropped_sends,
            "Relay hub stopped"
        );
    }

    fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Connected { peer_id, outbound } => self.handle_connect(peer_id, outbound),
            PeerEvent::Message {
                peer_id,
                msg,
                received_at,
            } => self.handle_message(peer_id, msg, received_at),
            PeerEvent::Disconnected { peer_id } => {
                self.registry.on_disconnect(peer_id);
                self.publish_peer_count();
            }
        }
    }

    fn handle_connect(&mut self, peer_id: Uuid, outbound: Outbound) {
        if let Err(e) = self.registry.on_connect(peer_id, outbound) {
            warn!(peer_id = %peer_id, error = %e, "Rejected connection");
            return;
        }
        self.publish_peer_count();
    }

    fn handle_message(&mut self, peer_id: Uuid, msg: ClientMsg, received_at: u64) {
        match msg {
            ClientMsg::State(update) => self.registry.on_state_update(peer_id, &update),
            ClientMsg::Fire(shots) => {
                let sent = on_fire(&self.registry, peer_id, &shots);
                debug!(peer_id = %peer_id, shots = shots.len(), sent, "Relayed fire");
            }
            ClientMsg::EnemyFire(shots) => {
                let count = shots.len();
                let sent = on_enemy_fire(&self.registry, peer_id, shots);
                debug!(peer_id = %peer_id, shots = count, sent, "Relayed enemy fire");
            }
            ClientMsg::Ping { t } => {
                self.registry.send_to(peer_id, ServerMsg::Pong { t });
            }
        }

        let lag_ms = unix_millis().saturating_sub(received_at);
        if lag_ms > self.broadcast_interval.as_millis() as u64 {
            warn!(peer_id = %peer_id, lag_ms, "Hub is falling behind its inbox");
        }
    }

    fn publish_peer_count(&self) {
        self.peer_count
            .store(self.registry.len(), Ordering::Relaxed);
    }
}
