use super::*;
use serde_json::json;

#[test]
fn normalize_room_defaults() {
    assert_eq!(normalize_room(None), "default");
    assert_eq!(normalize_room(Some("")), "default");
    assert_eq!(normalize_room(Some("A")), "A");
}

#[test]
fn normalize_publisher_id_trims_and_defaults() {
    assert_eq!(normalize_publisher_id(None), "unknown");
    assert_eq!(normalize_publisher_id(Some("")), "unknown");
    assert_eq!(normalize_publisher_id(Some("   ")), "unknown");
    assert_eq!(normalize_publisher_id(Some("  s1 ")), "s1");
}

#[test]
fn publisher_key_format() {
    assert_eq!(publisher_key("A", "s1"), "A:s1");
}

#[test]
fn hello_parses_with_optional_fields() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"hello","role":"teacher","room":"A"}"#).expect("parse");
    match msg {
        ClientMessage::Hello { role, room, publisher_id, display_name } => {
            assert_eq!(role.as_deref(), Some("teacher"));
            assert_eq!(room.as_deref(), Some("A"));
            assert!(publisher_id.is_none());
            assert!(display_name.is_none());
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn status_parses_payload_map() {
    let msg: ClientMessage =
        serde_json::from_str(r#"{"type":"status","publisherId":"s1","payload":{"step":3}}"#).expect("parse");
    match msg {
        ClientMessage::Status { payload, room, publisher_id } => {
            assert_eq!(payload.get("step"), Some(&json!(3)));
            assert!(room.is_none());
            assert_eq!(publisher_id.as_deref(), Some("s1"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn snapshot_request_parses_bare() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"snapshot_request"}"#).expect("parse");
    assert!(matches!(msg, ClientMessage::SnapshotRequest {}));
}

#[test]
fn unknown_type_fails_to_parse() {
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout","volume":11}"#).is_err());
    assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
}

#[test]
fn publisher_state_wire_names_are_camel_case() {
    let st = PublisherState::from_hello("A", "s1", Some("Alice"), 1000);
    let value = serde_json::to_value(&st).expect("serialize");

    assert_eq!(value["publisherKey"], json!("A:s1"));
    assert_eq!(value["room"], json!("A"));
    assert_eq!(value["publisherId"], json!("s1"));
    assert_eq!(value["displayName"], json!("Alice"));
    assert_eq!(value["lastSeenAt"], json!(1000));
    // disconnected=false is omitted entirely.
    assert!(value.get("disconnected").is_none());
}

#[test]
fn from_hello_display_name_falls_back_to_id() {
    let st = PublisherState::from_hello("A", "s1", None, 0);
    assert_eq!(st.display_name, "s1");
    let st = PublisherState::from_hello("A", "s1", Some(""), 0);
    assert_eq!(st.display_name, "s1");
}

#[test]
fn from_payload_keeps_extras_and_overwrites_reserved() {
    let mut payload = Map::new();
    payload.insert("step".into(), json!(7));
    payload.insert("publisherKey".into(), json!("X:spoofed"));
    payload.insert("lastSeenAt".into(), json!(1));
    payload.insert("room".into(), json!("X"));

    let st = PublisherState::from_payload("A", "A:s1", "s1", payload, 5000);
    assert_eq!(st.publisher_key, "A:s1");
    assert_eq!(st.room, "A");
    assert_eq!(st.last_seen_at, 5000);
    assert_eq!(st.extra.get("step"), Some(&json!(7)));
    // Spoofed reserved fields never survive into the extension map.
    assert!(st.extra.get("publisherKey").is_none());
    assert!(st.extra.get("lastSeenAt").is_none());
    assert!(st.extra.get("room").is_none());
}

#[test]
fn from_payload_display_name_from_payload() {
    let mut payload = Map::new();
    payload.insert("displayName".into(), json!("Alice"));
    let st = PublisherState::from_payload("A", "A:s1", "s1", payload, 0);
    assert_eq!(st.display_name, "Alice");
    assert!(st.extra.get("displayName").is_none());

    let st = PublisherState::from_payload("A", "A:s1", "s1", Map::new(), 0);
    assert_eq!(st.display_name, "s1");
}

#[test]
fn server_status_serializes_flat_payload() {
    let mut payload = Map::new();
    payload.insert("step".into(), json!(2));
    let st = PublisherState::from_payload("A", "A:s1", "s1", payload, 42);
    let msg = ServerMessage::Status { room: "A".into(), publisher_key: "A:s1".into(), payload: st };

    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], json!("status"));
    assert_eq!(value["publisherKey"], json!("A:s1"));
    assert_eq!(value["payload"]["step"], json!(2));
    assert_eq!(value["payload"]["lastSeenAt"], json!(42));
}

#[test]
fn hello_ack_omits_missing_key() {
    let msg = ServerMessage::HelloAck { role: "teacher".into(), room: "A".into(), publisher_key: None };
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], json!("hello_ack"));
    assert!(value.get("publisherKey").is_none());
}

#[test]
fn disconnected_round_trips_when_set() {
    let mut st = PublisherState::from_hello("A", "s1", None, 9);
    st.disconnected = true;
    let json_text = serde_json::to_string(&st).expect("serialize");
    let restored: PublisherState = serde_json::from_str(&json_text).expect("deserialize");
    assert!(restored.disconnected);
    assert_eq!(restored.publisher_key, "A:s1");
}
