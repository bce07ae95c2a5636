//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::relay::RelayHandle;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Any connection is accepted.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, relay: RelayHandle) {
    let (peer_id, outbound_rx) = match relay.connect().await {
        Ok(registered) => registered,
        Err(e) => {
            error!(error = %e, "Could not register connection");
            return;
        }
    };

    info!(peer_id = %peer_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    run_session(peer_id, ws_sink, ws_stream, &relay, outbound_rx).await;

    // Cleanup on disconnect
    if relay.disconnect(peer_id).await.is_err() {
        debug!(peer_id = %peer_id, "Relay already stopped");
    }

    info!(peer_id = %peer_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    peer_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    relay: &RelayHandle,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    // Writer task: hub -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(peer_id = %peer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> hub
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => {
                    if relay.message(peer_id, client_msg).await.is_err() {
                        debug!(peer_id = %peer_id, "Relay hub closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!(peer_id = %peer_id, error = %e, "Dropping malformed client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(peer_id = %peer_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(peer_id = %peer_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(peer_id = %peer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
