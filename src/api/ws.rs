use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use crate::api::routes::AppState;

/// Upgrades to a websocket and forwards every broadcast message to this
/// connection until it closes. Push-only: the client's own messages are
/// drained and discarded (the control plane is the HTTP surface).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
  ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
  let mut rx = state.broadcast.subscribe();
  loop {
    tokio::select! {
      incoming = socket.recv() => {
        match incoming {
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => continue,
          Some(Err(_)) => break,
        }
      }
      outgoing = rx.recv() => {
        match outgoing {
          Some(text) => {
            if socket.send(Message::Text(text)).await.is_err() {
              break;
            }
          }
          None => break,
        }
      }
    }
  }
}
