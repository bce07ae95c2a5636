// Integration test for the relay hub.
//
// Starts a hub, connects three peers through its public handle and drives the
// protocol with raw JSON frames, the way the WebSocket reader would: state
// reports, a player volley, an enemy volley and a host disconnect. Each peer
// feeds what it receives into a `PeerView`, so the test also checks the
// client-side reconciliation end-to-end.

use std::time::Duration;

use coop_relay::client::{PeerView, ProjectileSource, ViewChange};
use coop_relay::relay::{RelayHandle, RelayHub};
use coop_relay::ws::protocol::{ClientMsg, ServerMsg};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

struct TestPeer {
    id: Uuid,
    rx: mpsc::Receiver<ServerMsg>,
    view: PeerView,
}

impl TestPeer {
    async fn join(relay: &RelayHandle) -> Self {
        let (id, rx) = relay.connect().await.unwrap();
        let mut peer = Self {
            id,
            rx,
            view: PeerView::new(),
        };
        match peer.recv().await {
            ServerMsg::Welcome { id, .. } => assert_eq!(id, peer.id),
            other => panic!("expected welcome, got {other:?}"),
        }
        peer
    }

    /// Receive one message and apply it to the local view
    async fn recv(&mut self) -> ServerMsg {
        let msg = timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out")
            .expect("outbound closed");
        self.view.apply(&msg, 0);
        msg
    }

    /// Receive until `pred` matches, applying everything on the way
    async fn recv_until(&mut self, pred: impl Fn(&ServerMsg) -> bool) -> ServerMsg {
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
    }
}

async fn send_json(relay: &RelayHandle, peer: Uuid, frame: &str) {
    let msg: ClientMsg = serde_json::from_str(frame).unwrap();
    relay.message(peer, msg).await.unwrap();
}

#[tokio::test]
async fn full_session_lifecycle() {
    let (hub, relay) = RelayHub::new(Duration::from_millis(25), 128);
    tokio::spawn(hub.run());

    // 1. Three peers join; only the first is host.
    let mut host = TestPeer::join(&relay).await;
    let mut b = TestPeer::join(&relay).await;
    let mut c = TestPeer::join(&relay).await;
    assert!(host.view.is_host());
    assert!(!b.view.is_host());
    assert!(!c.view.is_host());
    assert_eq!(relay.peer_count(), 3);

    // 2. The host reports a move; b eventually sees it in a snapshot.
    send_json(
        &relay,
        host.id,
        r#"{"type":"state","data":{"x":600.5,"y":100.0,"weapon":"shotgun"}}"#,
    )
    .await;
    let host_id = host.id;
    b.recv_until(|msg| match msg {
        ServerMsg::PeersState(peers) => peers.iter().any(|p| p.id == host_id && p.state.x == 600.5),
        _ => false,
    })
    .await;
    let seen = b.view.remote(&host.id).unwrap();
    assert_eq!(seen.y, 100.0);
    assert_eq!(seen.hp, 6);
    assert_eq!(b.view.remote_count(), 2);

    // 3. b fires a three-bullet volley; c gets three remote_fire in order.
    send_json(
        &relay,
        b.id,
        r#"{"type":"fire","data":[
            {"x":1.0,"y":1.0,"dx":1.0,"dy":0.0,"speed":600.0},
            {"x":1.0,"y":1.0,"dx":0.0,"dy":1.0,"speed":601.0},
            {"x":1.0,"y":1.0,"dx":-1.0,"dy":0.0,"speed":602.0}
        ]}"#,
    )
    .await;
    let mut speeds = Vec::new();
    while speeds.len() < 3 {
        if let ServerMsg::RemoteFire(shot) =
            c.recv_until(|msg| matches!(msg, ServerMsg::RemoteFire(_))).await
        {
            speeds.push(shot.speed);
        }
    }
    assert_eq!(speeds, vec![600.0, 601.0, 602.0]);
    assert_eq!(c.view.projectiles().len(), 3);

    // 4. A malformed fire frame never decodes, so nothing is relayed.
    assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"fire","data":{"x":1}}"#).is_err());

    // 5. The host's enemy volley reaches the host as well.
    send_json(
        &relay,
        host.id,
        r#"{"type":"enemy_fire","data":[{"x":5.0,"y":5.0,"dx":0.0,"dy":-1.0,"speed":300.0}]}"#,
    )
    .await;
    host.recv_until(|msg| matches!(msg, ServerMsg::EnemyFire(_))).await;
    let last = host.view.projectiles().last().unwrap();
    assert_eq!(last.source, ProjectileSource::Enemy);
    assert_eq!(last.origin.speed, 300.0);

    // 6. The host leaves: others despawn it, and nobody becomes host.
    relay.disconnect(host.id).await.unwrap();
    let msg = c
        .recv_until(|msg| matches!(msg, ServerMsg::PeerLeft { .. }))
        .await;
    assert_eq!(msg, ServerMsg::PeerLeft { id: host.id });
    assert!(c.view.remote(&host.id).is_none());
    assert_eq!(relay.peer_count(), 2);

    let d = TestPeer::join(&relay).await;
    assert!(!d.view.is_host());

    // 7. Snapshots after the departure carry the newcomer but not the host.
    let d_id = d.id;
    let snapshot = b
        .recv_until(|msg| match msg {
            ServerMsg::PeersState(peers) => peers.iter().any(|p| p.id == d_id),
            _ => false,
        })
        .await;
    if let ServerMsg::PeersState(peers) = snapshot {
        assert_eq!(peers.len(), 3);
        assert!(peers.iter().all(|p| p.id != host_id));
    }
    assert!(b.view.remote(&host_id).is_none());
    assert!(b.view.remote(&d_id).is_some());

    // A late duplicate peer_left is harmless on the client.
    assert!(b
        .view
        .apply(&ServerMsg::PeerLeft { id: host_id }, 0)
        .iter()
        .all(|change| !matches!(change, ViewChange::Spawned { .. })));
}
