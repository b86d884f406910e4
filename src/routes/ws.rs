//! WebSocket handler — the per-connection protocol loop.
//!
//! DESIGN
//! ======
//! On upgrade, the connection is classified once (privileged or ordinary)
//! from its cookie and legacy query token, then enters a `select!` loop:
//! - Incoming text frames → parse + dispatch by message type
//! - Broadcast messages from the room → forward to this client
//!
//! Dispatch lives in `process_message`, which never touches the socket: it
//! returns the replies owed to the sender plus a close flag, so the whole
//! protocol state machine is testable against plain channels.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → AwaitingHello
//! 2. `hello` → Subscriber (teacher, gated) or Publisher (student)
//! 3. `status` / `snapshot_request` per role; everything else ignored
//! 4. Close → subscriber deregistered, or publisher flagged disconnected

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::msg::{ClientMessage, PublisherState, ServerMessage, normalize_publisher_id, normalize_room, now_ms, publisher_key};
use crate::routes::auth::SESSION_COOKIE;
use crate::services::{access, hub};
use crate::state::AppState;

/// Outbound channel depth per connection. A subscriber that falls this far
/// behind starts missing broadcasts (best-effort delivery).
const OUTBOUND_BUFFER: usize = 256;

// =============================================================================
// SESSION
// =============================================================================

/// Protocol state for one connection. `AwaitingHello` can move to either
/// role; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    AwaitingHello,
    Publisher,
    Subscriber,
}

/// Per-connection session. Lives on the connection task's stack; nothing
/// here survives the connection.
struct ConnSession {
    conn_id: Uuid,
    role: Role,
    room_id: String,
    publisher_key: Option<String>,
    privileged: bool,
}

impl ConnSession {
    fn new(conn_id: Uuid, privileged: bool) -> Self {
        Self {
            conn_id,
            role: Role::AwaitingHello,
            room_id: crate::msg::DEFAULT_ROOM.to_owned(),
            publisher_key: None,
            privileged,
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Response {
    // Classified once, before the connection may claim the teacher role.
    let privileged = access::classify(
        &state.access,
        jar.get(SESSION_COOKIE).map(Cookie::value),
        params.get("token").map(String::as_str),
        now_ms(),
    )
    .is_privileged();

    ws.on_upgrade(move |socket| run_ws(socket, state, privileged))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, privileged: bool) {
    let conn_id = Uuid::new_v4();
    let mut session = ConnSession::new(conn_id, privileged);

    // Per-connection channel for receiving room broadcasts.
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    info!(%conn_id, privileged, "ws: connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let (replies, close) = process_message(&state, &mut session, &tx, &text).await;
                        let mut send_failed = false;
                        for reply in replies {
                            if send_message(&mut socket, &reply).await.is_err() {
                                send_failed = true;
                                break;
                            }
                        }
                        if send_failed || close {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    // Non-text frames are ignored.
                    _ => {}
                }
            }
            Some(broadcast) = rx.recv() => {
                if send_message(&mut socket, &broadcast).await.is_err() {
                    break;
                }
            }
        }
    }

    close_session(&state, &session).await;
    info!(%conn_id, "ws: disconnected");
}

/// Close cleanup, run exactly once per connection. A subscriber is removed
/// from its room; a publisher entry is kept but flagged disconnected so it
/// stays visible until the reaper expires it.
async fn close_session(state: &AppState, session: &ConnSession) {
    match session.role {
        Role::Subscriber => {
            hub::remove_subscriber(state, &session.room_id, session.conn_id).await;
        }
        Role::Publisher => {
            if let Some(key) = &session.publisher_key {
                if let Some(st) = hub::mark_disconnected(state, &session.room_id, key, now_ms()).await {
                    broadcast_status(state, &session.room_id, st).await;
                }
            }
        }
        Role::AwaitingHello => {}
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and process one inbound text frame. Returns the replies owed to
/// the sender and whether the connection must close.
///
/// Socket-free by design: tests drive the full protocol state machine
/// through this function with plain channels.
async fn process_message(
    state: &AppState,
    session: &mut ConnSession,
    tx: &mpsc::Sender<ServerMessage>,
    text: &str,
) -> (Vec<ServerMessage>, bool) {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        // Malformed JSON and unknown types are silence, not errors.
        debug!(conn_id = %session.conn_id, "ws: unparseable message ignored");
        return (Vec::new(), false);
    };

    match msg {
        ClientMessage::Hello { role, room, publisher_id, display_name } if session.role == Role::AwaitingHello => {
            handle_hello(state, session, tx, role.as_deref(), room.as_deref(), publisher_id.as_deref(), display_name.as_deref()).await
        }
        ClientMessage::Status { payload, room, publisher_id } if session.role != Role::Subscriber => {
            let replies = handle_status(state, session, room.as_deref(), publisher_id.as_deref(), payload).await;
            (replies, false)
        }
        ClientMessage::SnapshotRequest {} if session.role == Role::Subscriber => {
            let items = hub::snapshot(state, &session.room_id).await;
            (vec![ServerMessage::Snapshot { room: session.room_id.clone(), items }], false)
        }
        // Wrong state/role combinations are silently ignored.
        _ => (Vec::new(), false),
    }
}

async fn handle_hello(
    state: &AppState,
    session: &mut ConnSession,
    tx: &mpsc::Sender<ServerMessage>,
    role: Option<&str>,
    room: Option<&str>,
    publisher_id: Option<&str>,
    display_name: Option<&str>,
) -> (Vec<ServerMessage>, bool) {
    session.room_id = normalize_room(room);

    if role == Some("teacher") {
        if !session.privileged {
            warn!(conn_id = %session.conn_id, room = %session.room_id, "ws: unauthorized teacher hello");
            return (vec![ServerMessage::Error { error: "not authorized".to_owned() }], true);
        }

        hub::add_subscriber(state, &session.room_id, session.conn_id, tx.clone()).await;
        session.role = Role::Subscriber;

        let items = hub::snapshot(state, &session.room_id).await;
        let replies = vec![
            ServerMessage::HelloAck { role: "teacher".to_owned(), room: session.room_id.clone(), publisher_key: None },
            ServerMessage::Snapshot { room: session.room_id.clone(), items },
        ];
        return (replies, false);
    }

    // Publisher hello: a bare hello already creates the room entry.
    let sid = normalize_publisher_id(publisher_id);
    let key = publisher_key(&session.room_id, &sid);
    session.publisher_key = Some(key.clone());
    session.role = Role::Publisher;

    let st = hub::hello_publisher(state, &session.room_id, &sid, display_name, now_ms()).await;
    let room_id = session.room_id.clone();
    broadcast_status(state, &room_id, st).await;

    (
        vec![ServerMessage::HelloAck {
            role: "publisher".to_owned(),
            room: room_id,
            publisher_key: Some(key),
        }],
        false,
    )
}

async fn handle_status(
    state: &AppState,
    session: &mut ConnSession,
    room: Option<&str>,
    publisher_id: Option<&str>,
    payload: serde_json::Map<String, serde_json::Value>,
) -> Vec<ServerMessage> {
    let sid = normalize_publisher_id(
        payload
            .get("publisherId")
            .and_then(serde_json::Value::as_str)
            .or(publisher_id),
    );

    // Lazy init: a publisher may send status without a prior hello. The
    // session adopts the message's room at that point; once a key exists
    // the room is fixed.
    let key = match &session.publisher_key {
        Some(key) => key.clone(),
        None => {
            if let Some(r) = room {
                session.room_id = normalize_room(Some(r));
            }
            let key = publisher_key(&session.room_id, &sid);
            session.publisher_key = Some(key.clone());
            session.role = Role::Publisher;
            key
        }
    };

    let st = hub::apply_status(state, &session.room_id, &key, &sid, payload, now_ms()).await;
    let room_id = session.room_id.clone();
    broadcast_status(state, &room_id, st).await;
    Vec::new()
}

async fn broadcast_status(state: &AppState, room_id: &str, st: PublisherState) {
    let message = ServerMessage::Status {
        room: room_id.to_owned(),
        publisher_key: st.publisher_key.clone(),
        payload: st,
    };
    hub::broadcast(state, room_id, &message).await;
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
