//! Client-side view of the relay: what a game client keeps in sync

pub mod reconcile;

pub use reconcile::{PeerView, Projectile, ProjectileSource, ViewChange, PROJECTILE_LIFETIME_MS};
