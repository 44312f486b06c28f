//! End-to-end scenario: simulator traffic plus topology editing on one state

use assert_matches::assert_matches;
use network_service::{
    EntityType, NetworkError,
    storage::{MeasurementStore, schema::HEADER},
    topology::{Connection, LastAction, Rejection, TopologyEvent},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{csv_state, file_server, memory_state, send, spawn_ingest, web_server};

#[tokio::test]
async fn test_full_scenario() {
    let dir = tempdir().unwrap();
    let (state, log) = csv_state(dir.path());

    let web = state.create_entity(web_server("web")).await.unwrap();
    let files = state.create_entity(file_server("files")).await.unwrap();
    assert_eq!((web.id, files.id), (1, 2));
    assert_eq!(web.entity_type, EntityType::Web);

    let ingest = spawn_ingest(&state).await;
    assert_eq!(send(ingest.local_addr(), "Need object count").await, "2");

    send(ingest.local_addr(), "Entitet_1:272").await;
    assert_eq!(state.entity(1).await.unwrap().current_value, 272.0);

    let content = std::fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], HEADER);
    assert!(lines[1].starts_with("1,272,"), "{}", lines[1]);

    state.place(1, 0).await.unwrap();
    state.place(2, 1).await.unwrap();
    assert_eq!(state.connect(0, 1).await.unwrap(), Connection::new(0, 1));
    assert_matches!(
        state.connect(0, 1).await,
        Err(NetworkError::Rejected(Rejection::DuplicateConnection { .. }))
    );

    assert_eq!(state.clear(0).await.unwrap(), 1);
    let cleared = state.topology().await;
    assert_eq!(cleared.occupant(0), None);
    assert!(cleared.connections.is_empty());

    assert_eq!(state.undo().await, Some(LastAction::Clear));
    let restored = state.topology().await;
    assert_eq!(restored.occupant(0), Some(1));
    assert_eq!(restored.occupant(1), Some(2));
    assert!(restored.is_connected(0, 1));

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_updates_refresh_the_slot_they_are_drawn_on() {
    let (state, _log) = memory_state();
    let web = state.create_entity(web_server("web")).await.unwrap();
    let files = state.create_entity(file_server("files")).await.unwrap();
    state.place(web.id, 4).await.unwrap();

    let mut events = state.subscribe_topology();

    let placed = state.apply_update(web.id, 50.0).await.unwrap();
    assert_eq!(placed.slot, Some(4));
    assert!(placed.persisted);

    let unplaced = state.apply_update(files.id, 60.0).await.unwrap();
    assert_eq!(unplaced.slot, None);

    assert_matches!(
        events.recv().await.unwrap(),
        TopologyEvent::EntityRefreshed { slot: Some(4), entity } if entity.current_value == 50.0
    );
    assert_matches!(
        events.recv().await.unwrap(),
        TopologyEvent::EntityRefreshed { slot: None, .. }
    );
}

#[tokio::test]
async fn test_move_then_undo_restores_connections() {
    let (state, _log) = memory_state();
    for name in ["a", "b", "c"] {
        state.create_entity(web_server(name)).await.unwrap();
    }
    state.place(1, 0).await.unwrap();
    state.place(2, 1).await.unwrap();
    state.place(3, 2).await.unwrap();
    state.connect(0, 1).await.unwrap();
    state.connect(2, 0).await.unwrap();
    let before = state.topology().await;

    state.move_entity(1, 0, 5).await.unwrap();
    let moved = state.topology().await;
    assert_eq!(moved.slot_of(1), Some(5));
    assert!(moved.is_connected(5, 1));
    assert!(moved.is_connected(2, 5));
    assert!(!moved.is_connected(0, 1));

    assert_eq!(state.undo().await, Some(LastAction::Move));
    let after = state.topology().await;
    assert_eq!(after.slots, before.slots);
    assert_eq!(after.connections, before.connections);
    assert_eq!(after.last_action, LastAction::None);
}

#[tokio::test]
async fn test_delete_cascades_and_discards_pending_undo() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("a")).await.unwrap();
    state.create_entity(web_server("b")).await.unwrap();
    state.place(1, 0).await.unwrap();
    state.place(2, 1).await.unwrap();
    state.connect(0, 1).await.unwrap();

    let deleted = state.delete_entity(2).await.unwrap();
    assert_eq!(deleted.id, 2);

    let snapshot = state.topology().await;
    assert_eq!(snapshot.occupant(1), None);
    assert!(snapshot.connections.is_empty());

    // the recorded connect referenced a slot that no longer exists as it was
    assert_eq!(state.undo().await, None);
    assert_eq!(state.topology().await, snapshot);
}

#[tokio::test]
async fn test_deleting_an_unplaced_server_keeps_unrelated_undo() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("a")).await.unwrap();
    state.create_entity(web_server("b")).await.unwrap();
    state.place(1, 3).await.unwrap();

    state.delete_entity(2).await.unwrap();

    assert_eq!(state.last_action().await, LastAction::Place);
    assert_eq!(state.undo().await, Some(LastAction::Place));
    assert_eq!(state.topology().await.occupant(3), None);
}

#[tokio::test]
async fn test_topology_rejects_unknown_servers() {
    let (state, _log) = memory_state();
    assert_matches!(state.place(7, 0).await, Err(NetworkError::NotFound(7)));
    assert_matches!(state.move_entity(7, 0, 1).await, Err(NetworkError::NotFound(7)));
    assert_matches!(state.clear_entity(7).await, Err(NetworkError::NotFound(7)));
}

#[tokio::test]
async fn test_clear_entity_by_id() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("a")).await.unwrap();

    assert_matches!(
        state.clear_entity(1).await,
        Err(NetworkError::Rejected(Rejection::NotPlaced(1)))
    );

    state.place(1, 6).await.unwrap();
    assert_eq!(state.clear_entity(1).await.unwrap(), 6);
    assert_eq!(state.unplaced().await.len(), 1);
    assert_eq!(state.last_action().await, LastAction::Clear);
}

#[tokio::test]
async fn test_unplaced_grouping() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("w1")).await.unwrap();
    state.create_entity(file_server("f1")).await.unwrap();
    state.create_entity(web_server("w2")).await.unwrap();
    state.place(1, 0).await.unwrap();

    let groups = state.unplaced_by_type().await;
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&EntityType::Web].len(), 1);
    assert_eq!(groups[&EntityType::Web][0].name, "w2");
    assert_eq!(groups[&EntityType::File][0].name, "f1");
    assert!(!groups.contains_key(&EntityType::Database));
}

#[tokio::test]
async fn test_history_of_fresh_log_is_empty() {
    let dir = tempdir().unwrap();
    let (state, log) = csv_state(dir.path());
    state.create_entity(web_server("web")).await.unwrap();

    assert!(state.recent_history(1, 5).await.unwrap().is_empty());
    assert!(log.load_all().await.unwrap_err().is_missing());
}
