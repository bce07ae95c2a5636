//! Applying relay messages to a client's local view
//!
//! Remote peers snap to each snapshot (no interpolation). A remote missing
//! from a snapshot is removed at once. Relayed shots become locally simulated
//! projectiles with a fixed lifetime; hits are each client's own business.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::ws::protocol::{FireEvent, PeerState, ServerMsg};

/// How long a relayed projectile lives on the client
pub const PROJECTILE_LIFETIME_MS: u64 = 1200;

/// What the presentation layer has to do after applying a message
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange {
    /// Create a representation for a remote peer
    Spawned { id: Uuid, state: PeerState },
    /// Overwrite an existing remote's position, rotation, health, weapon
    Updated { id: Uuid, state: PeerState },
    /// Tear a remote's representation down
    Despawned { id: Uuid },
    /// A projectile was added; `id` matches `Projectile::id`
    ProjectileSpawned { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileSource {
    RemotePeer,
    Enemy,
}

/// A projectile spawned from a relayed fire event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    /// Unique within one `PeerView`, never reused
    pub id: u64,
    pub origin: FireEvent,
    pub source: ProjectileSource,
    pub spawned_at: u64,
}

impl Projectile {
    pub fn expires_at(&self) -> u64 {
        self.spawned_at + PROJECTILE_LIFETIME_MS
    }

    pub fn is_alive(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at()
    }

    /// Straight-line position at `now_ms`, ignoring terrain
    pub fn position_at(&self, now_ms: u64) -> (f64, f64) {
        let elapsed = now_ms.saturating_sub(self.spawned_at) as f64 / 1000.0;
        let travel = self.origin.speed * elapsed;
        (
            self.origin.x + self.origin.dx * travel,
            self.origin.y + self.origin.dy * travel,
        )
    }
}

/// One client's picture of the session
#[derive(Debug, Default)]
pub struct PeerView {
    local_id: Option<Uuid>,
    is_host: bool,
    remotes: HashMap<Uuid, PeerState>,
    projectiles: Vec<Projectile>,
    next_projectile_id: u64,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_id(&self) -> Option<Uuid> {
        self.local_id
    }

    /// Whether this client should tick enemy and boss AI
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn remote(&self, id: &Uuid) -> Option<&PeerState> {
        self.remotes.get(id)
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Apply one server message received at `now_ms`
    pub fn apply(&mut self, msg: &ServerMsg, now_ms: u64) -> Vec<ViewChange> {
        match msg {
            ServerMsg::Welcome { id, is_host } => {
                self.local_id = Some(*id);
                self.is_host = *is_host;
                // Our own entry might have been seen as a remote before welcome.
                if self.remotes.remove(id).is_some() {
                    vec![ViewChange::Despawned { id: *id }]
                } else {
                    Vec::new()
                }
            }
            ServerMsg::PeersState(peers) => self.apply_snapshot(peers.iter().map(|p| (p.id, p.state))),
            ServerMsg::PeerLeft { id } => match self.remotes.remove(id) {
                Some(_) => vec![ViewChange::Despawned { id: *id }],
                None => Vec::new(),
            },
            ServerMsg::RemoteFire(shot) => {
                vec![self.spawn_projectile(*shot, ProjectileSource::RemotePeer, now_ms)]
            }
            ServerMsg::EnemyFire(shots) => shots
                .iter()
                .map(|shot| self.spawn_projectile(*shot, ProjectileSource::Enemy, now_ms))
                .collect(),
            ServerMsg::Pong { .. } => Vec::new(),
        }
    }

    /// Drop projectiles whose lifetime ran out; returns how many were removed
    pub fn expire_projectiles(&mut self, now_ms: u64) -> usize {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.is_alive(now_ms));
        before - self.projectiles.len()
    }

    fn apply_snapshot(&mut self, peers: impl Iterator<Item = (Uuid, PeerState)>) -> Vec<ViewChange> {
        let mut changes = Vec::new();
        let mut seen = HashSet::new();

        for (id, state) in peers {
            if Some(id) == self.local_id {
                continue;
            }
            seen.insert(id);
            match self.remotes.insert(id, state) {
                Some(_) => changes.push(ViewChange::Updated { id, state }),
                None => changes.push(ViewChange::Spawned { id, state }),
            }
        }

        let gone: Vec<Uuid> = self
            .remotes
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        for id in gone {
            self.remotes.remove(&id);
            changes.push(ViewChange::Despawned { id });
        }

        changes
    }

    fn spawn_projectile(&mut self, origin: FireEvent, source: ProjectileSource, now_ms: u64) -> ViewChange {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile {
            id,
            origin,
            source,
            spawned_at: now_ms,
        });
        ViewChange::ProjectileSpawned { id }
    }
}
