//! In-process fan-out of project chat messages to connected sockets.
//!
//! One broadcast channel per project, created on first subscribe and
//! dropped once nobody listens. Delivery is at most once per connection:
//! a socket that lags behind the channel capacity skips messages.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use hive_core::models::ChatMessage;

const ROOM_CAPACITY: usize = 256;

/// Frames sent to chat clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    ChatMessage { message: ChatMessage },
    Error { code: String, message: String },
}

#[derive(Clone, Default)]
pub struct ChatHub {
    rooms: Arc<RwLock<HashMap<Uuid, broadcast::Sender<ChatEvent>>>>,
}

impl ChatHub {
    pub async fn subscribe(&self, project_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(project_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many sockets will receive the message.
    pub async fn publish(&self, message: ChatMessage) -> usize {
        let project_id = message.project_id;
        let rooms = self.rooms.read().await;
        match rooms.get(&project_id) {
            Some(tx) => tx.send(ChatEvent::ChatMessage { message }).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the room once its last socket has gone.
    pub async fn release(&self, project_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&project_id).is_some_and(|tx| tx.receiver_count() == 0) {
            rooms.remove(&project_id);
            tracing::debug!(project_id = %project_id, "chat room closed");
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
