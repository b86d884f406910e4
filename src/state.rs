//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the room registry and the access-gate configuration. Rooms are
//! created lazily on first reference and never destroyed — each room owns
//! its own lock, so one busy room never stalls the others or the registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::msg::{DEFAULT_ROOM, PublisherState, ServerMessage};
use crate::services::access::AccessConfig;

// =============================================================================
// ROOM
// =============================================================================

/// Mutable contents of one room. Guarded by the room's lock: hello/status
/// handling, connection close, and the reaper all contend here.
#[derive(Default)]
pub struct RoomInner {
    /// Last-known state per publisher key (`"room:id"`).
    pub publishers: HashMap<String, PublisherState>,
    /// Live subscriber connections: connection id -> outbound sender.
    pub subscribers: HashMap<Uuid, mpsc::Sender<ServerMessage>>,
}

/// One room. Shared via `Arc`; all mutation goes through `inner`.
#[derive(Default)]
pub struct Room {
    pub inner: RwLock<RoomInner>,
}

// =============================================================================
// ROOM REGISTRY
// =============================================================================

/// Owns the room table. Rooms are immortal for the process lifetime; only
/// their publisher entries are reclaimed (by the staleness reaper).
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the room for `room_id`, creating it on first reference. Empty id
    /// normalizes to `"default"`. Concurrent callers for the same id observe
    /// a single winner.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        let room_id = if room_id.is_empty() { DEFAULT_ROOM } else { room_id };

        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(room_id) {
                return Arc::clone(room);
            }
        }

        let mut rooms = self.rooms.write().await;
        Arc::clone(rooms.entry(room_id.to_owned()).or_default())
    }

    /// Point-in-time list of all rooms, for the reaper's sweep.
    pub async fn snapshot(&self) -> Vec<(String, Arc<Room>)> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .map(|(id, room)| (id.clone(), Arc::clone(room)))
            .collect()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped or cheap.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    pub access: Arc<AccessConfig>,
    /// Root of the static site served at `/`.
    pub site_dir: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(access: AccessConfig, site_dir: PathBuf) -> Self {
        Self { rooms: Arc::new(RoomRegistry::new()), access: Arc::new(access), site_dir }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    pub const TEST_PIN: &str = "ABC234";
    pub const TEST_TOKEN: &str = "legacy-token-1";

    /// Create a test `AppState` with a fixed PIN and legacy token.
    #[must_use]
    pub fn test_app_state() -> AppState {
        let access = AccessConfig::new(TEST_PIN, Some(TEST_TOKEN.to_owned()));
        AppState::new(access, PathBuf::from("site"))
    }

    /// Register a subscriber channel in a room, returning the connection id
    /// and the receiving end.
    pub async fn seed_subscriber(state: &AppState, room_id: &str) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        let room = state.rooms.get_or_create(room_id).await;
        room.inner.write().await.subscribers.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Insert a publisher entry directly, bypassing the hub.
    pub async fn seed_publisher(state: &AppState, room_id: &str, publisher_id: &str, last_seen_at: i64) {
        let st = PublisherState::from_hello(room_id, publisher_id, None, last_seen_at);
        let room = state.rooms.get_or_create(room_id).await;
        room.inner
            .write()
            .await
            .publishers
            .insert(st.publisher_key.clone(), st);
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
