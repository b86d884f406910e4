//! Wire message contract for the status hub.
//!
//! ARCHITECTURE
//! ============
//! Every exchange is a small JSON object tagged by `type`. Clients send
//! `hello` / `status` / `snapshot_request`; the server answers with
//! `hello_ack` / `snapshot` / `status` / `bye` / `error`. Anything that
//! fails to parse is silently dropped by the ws loop — an unknown `type`
//! is not a protocol error, it is a message for somebody else.
//!
//! DESIGN
//! ======
//! - `PublisherState` is a structured record: five server-owned fields plus
//!   a flattened extension map for whatever the client put in its payload.
//! - Field names on the wire are camelCase to match the browser clients.
//! - Key derivation and id normalization live here so every caller agrees
//!   on `"room:id"` and on the `"unknown"` fallback.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// TIME
// =============================================================================

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Room id used when a client supplies none.
pub const DEFAULT_ROOM: &str = "default";

/// Publisher id used when a client supplies none (or only whitespace).
pub const UNKNOWN_PUBLISHER: &str = "unknown";

/// Normalize an optional room id: empty or missing becomes `"default"`.
#[must_use]
pub fn normalize_room(room: Option<&str>) -> String {
    match room {
        Some(r) if !r.is_empty() => r.to_owned(),
        _ => DEFAULT_ROOM.to_owned(),
    }
}

/// Normalize an optional publisher id: trimmed, empty becomes `"unknown"`.
#[must_use]
pub fn normalize_publisher_id(id: Option<&str>) -> String {
    match id.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_owned(),
        _ => UNKNOWN_PUBLISHER.to_owned(),
    }
}

/// Derive the room-scoped publisher key. Stable across reconnects of the
/// same logical publisher.
#[must_use]
pub fn publisher_key(room: &str, publisher_id: &str) -> String {
    format!("{room}:{publisher_id}")
}

// =============================================================================
// PUBLISHER STATE
// =============================================================================

/// Last-known state of one publisher in a room.
///
/// Replaced wholesale on every `status` message: the extension map is
/// rebuilt from the incoming payload, and the required fields are always
/// stamped server-side so a client can never back-date `lastSeenAt` or
/// claim another key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherState {
    pub publisher_key: String,
    pub room: String,
    pub publisher_id: String,
    pub display_name: String,
    /// Milliseconds since Unix epoch, server clock.
    pub last_seen_at: i64,
    /// Present (true) only after the publisher's connection closed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disconnected: bool,
    /// Caller-supplied payload fields, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PublisherState {
    /// Build a fresh entry from a `hello`, with no payload fields yet.
    #[must_use]
    pub fn from_hello(room: &str, publisher_id: &str, display_name: Option<&str>, now: i64) -> Self {
        let display_name = match display_name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => publisher_id.to_owned(),
        };
        Self {
            publisher_key: publisher_key(room, publisher_id),
            room: room.to_owned(),
            publisher_id: publisher_id.to_owned(),
            display_name,
            last_seen_at: now,
            disconnected: false,
            extra: Map::new(),
        }
    }

    /// Build a replacement entry from a `status` payload. Reserved fields in
    /// the payload are discarded in favor of the server-computed values,
    /// except `displayName`, which the payload may set.
    #[must_use]
    pub fn from_payload(room: &str, key: &str, publisher_id: &str, mut payload: Map<String, Value>, now: i64) -> Self {
        let display_name = payload
            .get("displayName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(publisher_id)
            .to_owned();
        for reserved in ["publisherKey", "room", "publisherId", "displayName", "lastSeenAt", "disconnected"] {
            payload.remove(reserved);
        }
        Self {
            publisher_key: key.to_owned(),
            room: room.to_owned(),
            publisher_id: publisher_id.to_owned(),
            display_name,
            last_seen_at: now,
            disconnected: false,
            extra: payload,
        }
    }
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Messages accepted from clients. Deserialization failure (malformed JSON,
/// unknown `type`, wrong field shapes) is treated as silence, not an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        room: Option<String>,
        #[serde(default, rename = "publisherId")]
        publisher_id: Option<String>,
        #[serde(default, rename = "displayName")]
        display_name: Option<String>,
    },
    Status {
        #[serde(default)]
        payload: Map<String, Value>,
        #[serde(default)]
        room: Option<String>,
        #[serde(default, rename = "publisherId")]
        publisher_id: Option<String>,
    },
    SnapshotRequest {},
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// Messages sent to clients. Cloned per subscriber by the broadcast path;
/// serialized once at the socket boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    HelloAck {
        role: String,
        room: String,
        #[serde(rename = "publisherKey", skip_serializing_if = "Option::is_none")]
        publisher_key: Option<String>,
    },
    Snapshot {
        room: String,
        items: Vec<PublisherState>,
    },
    Status {
        room: String,
        #[serde(rename = "publisherKey")]
        publisher_key: String,
        payload: PublisherState,
    },
    Bye {
        room: String,
        #[serde(rename = "publisherKey")]
        publisher_key: String,
    },
    Error {
        error: String,
    },
}

#[cfg(test)]
#[path = "msg_test.rs"]
mod tests;
