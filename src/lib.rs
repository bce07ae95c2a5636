//! Co-op relay - LAN peer state synchronization and combat event relay
//!
//! Clients each run their own simulation. The relay only:
//! - keeps every peer's last reported state and broadcasts it on a fixed tick
//! - fans `fire` / `enemy_fire` volleys out to the other peers
//! - designates the first peer into an empty session as host
//!
//! `client::PeerView` is the matching client-side reconciliation logic.

pub mod app;
pub mod client;
pub mod config;
pub mod http;
pub mod relay;
pub mod util;
pub mod ws;
