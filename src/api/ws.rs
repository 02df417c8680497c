//! WebSocket Broadcaster
//!
//! Fans push-channel events out to all connected WebSocket clients.

use tokio::sync::broadcast;

use super::types::WsMessage;
use crate::broadcast::TokenUpdate;

/// Channel for broadcasting events to WebSocket clients
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<String>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to receive broadcast messages
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Broadcast a message to all connected clients
    pub fn broadcast(&self, msg: &WsMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            // Ignore send errors (no receivers is fine)
            let _ = self.tx.send(json);
        }
    }

    /// Broadcast one token change event
    pub fn broadcast_update(&self, update: TokenUpdate) {
        self.broadcast(&WsMessage::Update(update));
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
