use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// Tagged push message shapes (`parameters_update | status_update | error`),
/// each carrying a UTC timestamp and a data payload matching the
/// corresponding GET response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
  ParametersUpdate { timestamp: chrono::DateTime<Utc>, data: serde_json::Value },
  StatusUpdate { timestamp: chrono::DateTime<Utc>, data: serde_json::Value },
  Error { timestamp: chrono::DateTime<Utc>, data: String },
}

impl BroadcastMessage {
  pub fn parameters_update(data: serde_json::Value) -> Self {
    Self::ParametersUpdate { timestamp: Utc::now(), data }
  }

  pub fn status_update(data: serde_json::Value) -> Self {
    Self::StatusUpdate { timestamp: Utc::now(), data }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::Error { timestamp: Utc::now(), data: message.into() }
  }
}

/// Single producer -> single drain-thread -> N websocket subscribers: one
/// `crossbeam_channel` receiver drained on a background thread, fanned out
/// to every currently-open websocket connection.
pub struct BroadcastHub {
  tx: crossbeam_channel::Sender<BroadcastMessage>,
  subscribers: Mutex<Vec<tokio::sync::mpsc::UnboundedSender<String>>>,
}

impl BroadcastHub {
  pub fn new() -> std::sync::Arc<Self> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let hub = std::sync::Arc::new(Self { tx, subscribers: Mutex::new(Vec::new()) });
    spawn_drain(std::sync::Arc::clone(&hub), rx);
    hub
  }

  pub fn publish(&self, message: BroadcastMessage) {
    let _ = self.tx.send(message);
  }

  pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    self.subscribers.lock().expect("broadcast subscriber list poisoned").push(tx);
    rx
  }

  fn fan_out(&self, text: String) {
    let mut subs = self.subscribers.lock().expect("broadcast subscriber list poisoned");
    subs.retain(|tx| tx.send(text.clone()).is_ok());
  }
}

fn spawn_drain(hub: std::sync::Arc<BroadcastHub>, rx: crossbeam_channel::Receiver<BroadcastMessage>) {
  std::thread::spawn(move || {
    while let Ok(message) = rx.recv() {
      match serde_json::to_string(&message) {
        Ok(text) => hub.fan_out(text),
        Err(e) => tracing::warn!(error = %e, "failed to serialize broadcast message"),
      }
    }
  });
}
