//! Broadcast hub — room mutations and fan-out to subscribers.
//!
//! DESIGN
//! ======
//! Free functions over `AppState`, one per room mutation. Each mutation
//! holds the room's own lock only while touching the maps; sends happen
//! after the lock is dropped, against a copied sender list, so a slow
//! subscriber never blocks a room and pruning never mutates a collection
//! mid-iteration.
//!
//! ERROR HANDLING
//! ==============
//! Broadcast is best-effort: a closed channel gets the subscriber pruned, a
//! momentarily full channel just drops that one message. Neither outcome is
//! surfaced to the publisher.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::msg::{PublisherState, ServerMessage};
use crate::state::AppState;

// =============================================================================
// SUBSCRIBERS
// =============================================================================

/// Register a subscriber connection in a room.
pub async fn add_subscriber(state: &AppState, room_id: &str, conn_id: Uuid, tx: mpsc::Sender<ServerMessage>) {
    let room = state.rooms.get_or_create(room_id).await;
    let mut inner = room.inner.write().await;
    inner.subscribers.insert(conn_id, tx);
    info!(room = room_id, %conn_id, subscribers = inner.subscribers.len(), "subscriber joined");
}

/// Remove a subscriber connection from a room (close path).
pub async fn remove_subscriber(state: &AppState, room_id: &str, conn_id: Uuid) {
    let room = state.rooms.get_or_create(room_id).await;
    let mut inner = room.inner.write().await;
    if inner.subscribers.remove(&conn_id).is_some() {
        info!(room = room_id, %conn_id, remaining = inner.subscribers.len(), "subscriber left");
    }
}

// =============================================================================
// PUBLISHER STATE
// =============================================================================

/// Create (or overwrite) a publisher entry from a `hello`.
pub async fn hello_publisher(
    state: &AppState,
    room_id: &str,
    publisher_id: &str,
    display_name: Option<&str>,
    now: i64,
) -> PublisherState {
    let st = PublisherState::from_hello(room_id, publisher_id, display_name, now);
    let room = state.rooms.get_or_create(room_id).await;
    room.inner
        .write()
        .await
        .publishers
        .insert(st.publisher_key.clone(), st.clone());
    debug!(room = room_id, key = %st.publisher_key, "publisher registered");
    st
}

/// Replace a publisher entry from a `status` payload. Full replace, not a
/// merge: the previous extension fields are gone.
pub async fn apply_status(
    state: &AppState,
    room_id: &str,
    key: &str,
    publisher_id: &str,
    payload: serde_json::Map<String, serde_json::Value>,
    now: i64,
) -> PublisherState {
    let st = PublisherState::from_payload(room_id, key, publisher_id, payload, now);
    let room = state.rooms.get_or_create(room_id).await;
    room.inner
        .write()
        .await
        .publishers
        .insert(key.to_owned(), st.clone());
    st
}

/// Flag a publisher as disconnected without removing it, refreshing
/// `last_seen_at` so the entry survives until the reaper's expiry window
/// lapses. Returns the updated state for broadcast, if the entry exists.
pub async fn mark_disconnected(state: &AppState, room_id: &str, key: &str, now: i64) -> Option<PublisherState> {
    let room = state.rooms.get_or_create(room_id).await;
    let mut inner = room.inner.write().await;
    let st = inner.publishers.get_mut(key)?;
    st.disconnected = true;
    st.last_seen_at = now;
    Some(st.clone())
}

/// Point-in-time copy of every publisher state in a room.
pub async fn snapshot(state: &AppState, room_id: &str) -> Vec<PublisherState> {
    let room = state.rooms.get_or_create(room_id).await;
    let inner = room.inner.read().await;
    inner.publishers.values().cloned().collect()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Fan a message out to every subscriber of a room, best-effort.
///
/// The sender list is copied under a read lock and iterated lock-free.
/// Subscribers whose channel has closed are pruned afterwards; the failure
/// is never surfaced to the publisher.
pub async fn broadcast(state: &AppState, room_id: &str, message: &ServerMessage) {
    let room = state.rooms.get_or_create(room_id).await;

    let targets: Vec<(Uuid, mpsc::Sender<ServerMessage>)> = {
        let inner = room.inner.read().await;
        inner
            .subscribers
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    };

    let mut dead = Vec::new();
    for (conn_id, tx) in targets {
        match tx.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Best-effort: a backed-up subscriber misses this message.
                debug!(room = room_id, %conn_id, "subscriber channel full; message dropped");
            }
            Err(TrySendError::Closed(_)) => dead.push(conn_id),
        }
    }

    if !dead.is_empty() {
        let mut inner = room.inner.write().await;
        for conn_id in &dead {
            inner.subscribers.remove(conn_id);
        }
        info!(room = room_id, pruned = dead.len(), "pruned dead subscribers during broadcast");
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
