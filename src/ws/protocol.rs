//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is `{"type": <channel>, "data": <payload>}`. Decoding is
//! strict: an unknown channel, a field of the wrong type, or a `fire` payload
//! that is not an array fails to parse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spawn position and stats given to every peer on connect
pub const SPAWN_X: f64 = 480.0;
pub const SPAWN_Y: f64 = 320.0;
pub const SPAWN_ROT: f64 = 0.0;
pub const SPAWN_HP: i32 = 6;

/// Weapons a peer can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weapon {
    #[default]
    Pistol,
    Shotgun,
    Rifle,
}

/// Last reported state of one peer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    pub x: f64,
    pub y: f64,
    /// Rotation in radians
    pub rot: f64,
    pub hp: i32,
    pub weapon: Weapon,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            x: SPAWN_X,
            y: SPAWN_Y,
            rot: SPAWN_ROT,
            hp: SPAWN_HP,
            weapon: Weapon::Pistol,
        }
    }
}

impl PeerState {
    /// Shallow merge: fields present in `update` overwrite, the rest are kept
    pub fn apply(&mut self, update: &StateUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(rot) = update.rot {
            self.rot = rot;
        }
        if let Some(hp) = update.hp {
            self.hp = hp;
        }
        if let Some(weapon) = update.weapon {
            self.weapon = weapon;
        }
    }
}

/// Partial state report; any subset of fields may be present
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Weapon>,
}

/// One projectile launch: origin, unit direction, speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub speed: f64,
}

/// Peer entry inside a `peers_state` snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: PeerState,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Own state report
    State(StateUpdate),

    /// Player volley, one entry per bullet
    Fire(Vec<FireEvent>),

    /// Host-simulated enemy or boss volley
    EnemyFire(Vec<FireEvent>),

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to the connecting peer
    Welcome {
        id: Uuid,
        #[serde(rename = "isHost")]
        is_host: bool,
    },

    /// Full registry snapshot (sent at regular intervals)
    PeersState(Vec<PeerSnapshot>),

    /// One shot fired by another peer
    RemoteFire(FireEvent),

    /// Enemy volley relayed from the host
    EnemyFire(Vec<FireEvent>),

    /// Peer disconnected
    PeerLeft { id: Uuid },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
