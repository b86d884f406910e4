use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn get_or_create_returns_same_room() {
    let registry = RoomRegistry::new();
    let a = registry.get_or_create("A").await;
    let b = registry.get_or_create("A").await;
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn empty_room_id_normalizes_to_default() {
    let registry = RoomRegistry::new();
    let a = registry.get_or_create("").await;
    let b = registry.get_or_create("default").await;
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn distinct_ids_get_distinct_rooms() {
    let registry = RoomRegistry::new();
    let a = registry.get_or_create("A").await;
    let b = registry.get_or_create("B").await;
    assert!(!Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn concurrent_get_or_create_single_winner() {
    let registry = Arc::new(RoomRegistry::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.get_or_create("busy").await }));
    }

    let mut rooms = Vec::new();
    for handle in handles {
        rooms.push(handle.await.expect("task should complete"));
    }
    let first = &rooms[0];
    assert!(rooms.iter().all(|room| Arc::ptr_eq(first, room)));
    assert_eq!(registry.snapshot().await.len(), 1);
}

#[tokio::test]
async fn snapshot_lists_all_rooms() {
    let registry = RoomRegistry::new();
    registry.get_or_create("A").await;
    registry.get_or_create("B").await;

    let mut ids: Vec<String> = registry.snapshot().await.into_iter().map(|(id, _)| id).collect();
    ids.sort();
    assert_eq!(ids, vec!["A".to_owned(), "B".to_owned()]);
}

#[tokio::test]
async fn rooms_are_never_deleted() {
    let state = test_helpers::test_app_state();
    let (conn_id, rx) = test_helpers::seed_subscriber(&state, "A").await;
    drop(rx);

    let room = state.rooms.get_or_create("A").await;
    room.inner.write().await.subscribers.remove(&conn_id);

    // Emptied of members, the room itself stays registered.
    assert_eq!(state.rooms.snapshot().await.len(), 1);
}
