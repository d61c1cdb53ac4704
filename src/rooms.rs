//! Room registry — which connections are viewing which note.
//!
//! DESIGN
//! ======
//! One `RwLock` guards the whole map of rooms. Joins and leaves take the
//! write lock because they may insert or remove a room key; broadcasts take
//! the read lock, so fan-outs into any room run concurrently with each other
//! and only serialize against membership changes.
//!
//! Rooms exist only while they have members: created on first join, removed
//! on last leave.
//!
//! ERROR HANDLING
//! ==============
//! A failed send to one member is logged and skipped. It never reaches the
//! broadcaster and never stops delivery to the remaining members.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::conn::{ConnId, Connection, Envelope};

// =============================================================================
// TYPES
// =============================================================================

type Members = HashMap<ConnId, Arc<dyn Connection>>;

/// Snapshot counters for the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub rooms: usize,
    pub connections: usize,
}

/// Process-wide room membership, shared through `AppState`.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Members>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    /// Add `conn` to the room for `document_id`, creating the room if needed.
    /// Joining twice with the same connection leaves a single entry.
    pub async fn join(&self, document_id: &str, conn: Arc<dyn Connection>) {
        let mut rooms = self.rooms.write().await;
        let conn_id = conn.id();
        let members = rooms.entry(document_id.to_owned()).or_insert_with(|| {
            info!(%document_id, "rooms: created room");
            HashMap::new()
        });
        members.insert(conn_id, conn);
        info!(%document_id, %conn_id, members = members.len(), "rooms: connection joined");
    }

    /// Remove `conn_id` from the room. Returns `true` when this emptied the
    /// room and it was deleted. Unknown rooms are a no-op.
    pub async fn leave(&self, document_id: &str, conn_id: ConnId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(document_id) else {
            return false;
        };

        members.remove(&conn_id);
        info!(%document_id, %conn_id, remaining = members.len(), "rooms: connection left");

        if members.is_empty() {
            rooms.remove(document_id);
            info!(%document_id, "rooms: removed empty room");
            return true;
        }
        false
    }

    // =========================================================================
    // BROADCAST
    // =========================================================================

    /// Deliver `envelope` to every member of the room except `sender`.
    /// Returns the number of members that accepted the message.
    pub async fn broadcast(&self, document_id: &str, sender: ConnId, envelope: &Envelope) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(document_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (conn_id, conn) in members {
            if *conn_id == sender {
                continue;
            }
            match conn.send(envelope.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%document_id, %conn_id, error = %e, "rooms: broadcast to member failed"),
            }
        }
        delivered
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Number of members in the room, zero when it does not exist.
    pub async fn member_count(&self, document_id: &str) -> usize {
        self.rooms.read().await.get(document_id).map_or(0, HashMap::len)
    }

    pub async fn stats(&self) -> RegistryStats {
        let rooms = self.rooms.read().await;
        RegistryStats { rooms: rooms.len(), connections: rooms.values().map(HashMap::len).sum() }
    }

    #[cfg(test)]
    pub async fn contains_room(&self, document_id: &str) -> bool {
        self.rooms.read().await.contains_key(document_id)
    }

    #[cfg(test)]
    pub async fn member_ids(&self, document_id: &str) -> Vec<ConnId> {
        self.rooms
            .read()
            .await
            .get(document_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
