//! Integration tests for the simulator-facing TCP listener
//!
//! These tests verify that:
//! - Count queries are answered with the registry size
//! - Updates for known servers change the value and reach the log
//! - Updates for unknown servers and noise change nothing
//! - The listener keeps serving after bad connections

use std::time::Duration;

use network_service::{ingest::IngestStats, registry::RegistryEvent, storage::MeasurementStore};
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::helpers::{file_server, memory_state, send, spawn_ingest, web_server};

#[tokio::test]
async fn test_count_query_reports_registry_size() {
    let (state, _log) = memory_state();
    let ingest = spawn_ingest(&state).await;

    assert_eq!(send(ingest.local_addr(), "Need object count").await, "0");

    state.create_entity(web_server("web")).await.unwrap();
    state.create_entity(file_server("files")).await.unwrap();
    assert_eq!(send(ingest.local_addr(), "Need object count").await, "2");

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_update_known_server() {
    let (state, log) = memory_state();
    let web = state.create_entity(web_server("web")).await.unwrap();
    let mut events = state.subscribe_registry();
    let ingest = spawn_ingest(&state).await;

    let response = send(ingest.local_addr(), &format!("Entitet_{}:272", web.id)).await;
    assert!(response.is_empty(), "updates get no reply");

    assert_eq!(state.entity(web.id).await.unwrap().current_value, 272.0);

    let records = log.load_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity_id, web.id);
    assert_eq!(records[0].value, 272.0);
    assert!(records[0].to_row().starts_with("1,272,"));

    let event = events.recv().await.unwrap();
    assert!(matches!(event, RegistryEvent::ValueChanged { id, value, .. } if id == web.id && value == 272.0));

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_update_unknown_server_changes_nothing() {
    let (state, log) = memory_state();
    let web = state.create_entity(web_server("web")).await.unwrap();
    let ingest = spawn_ingest(&state).await;

    send(ingest.local_addr(), "Entitet_99:50").await;

    assert_eq!(state.entity(web.id).await.unwrap().current_value, 0.0);
    assert!(log.is_empty().await);

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.unknown_entities, 1);
    assert_eq!(stats.updates_applied, 0);

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_noise_is_dropped_silently() {
    let (state, log) = memory_state();
    state.create_entity(web_server("web")).await.unwrap();
    let ingest = spawn_ingest(&state).await;

    for message in [
        "hello",
        "need object count",
        "Need object count\n",
        "Entitet_1",
        "Entitet_x:5",
        "Entitet_1:abc",
        "Entitet_1:NaN",
        "Entity_1:50",
        "",
    ] {
        assert_eq!(send(ingest.local_addr(), message).await, "", "{message:?}");
    }

    assert!(log.is_empty().await);
    assert_eq!(state.entity(1).await.unwrap().current_value, 0.0);

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.dropped, 9);
    assert_eq!(stats.accepted, 9);

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_empty_message_is_dropped_once_peer_closes() {
    let (state, _log) = memory_state();
    let ingest = spawn_ingest(&state).await;

    let response = tokio::time::timeout(Duration::from_secs(5), send(ingest.local_addr(), ""))
        .await
        .expect("worker must finish after the peer closes its write half");
    assert_eq!(response, "");

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.dropped, 1);

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_padded_numbers_are_accepted() {
    let (state, _log) = memory_state();
    let web = state.create_entity(web_server("web")).await.unwrap();
    let ingest = spawn_ingest(&state).await;

    send(ingest.local_addr(), "Entitet_1: 61.5\r\n").await;
    assert_eq!(state.entity(web.id).await.unwrap().current_value, 61.5);

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_listener_survives_abandoned_connections() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("web")).await.unwrap();
    let ingest = spawn_ingest(&state).await;

    // connects and leaves without sending anything
    let silent = TcpStream::connect(ingest.local_addr()).await.unwrap();

    // closes its write half right away
    let mut closed = TcpStream::connect(ingest.local_addr()).await.unwrap();
    closed.shutdown().await.unwrap();
    drop(closed);

    assert_eq!(send(ingest.local_addr(), "Need object count").await, "1");
    drop(silent);

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_stats_track_every_kind_of_message() {
    let (state, _log) = memory_state();
    state.create_entity(web_server("web")).await.unwrap();
    let ingest = spawn_ingest(&state).await;

    send(ingest.local_addr(), "Need object count").await;
    send(ingest.local_addr(), "Entitet_1:50").await;
    send(ingest.local_addr(), "Entitet_1:51").await;
    send(ingest.local_addr(), "Entitet_7:51").await;
    send(ingest.local_addr(), "garbage").await;

    assert_eq!(
        ingest.stats().await.unwrap(),
        IngestStats {
            accepted: 5,
            count_queries: 1,
            updates_applied: 2,
            unknown_entities: 1,
            dropped: 1,
        }
    );

    ingest.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (state, _log) = memory_state();
    let ingest = spawn_ingest(&state).await;
    let addr = ingest.local_addr();

    ingest.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(ingest.stats().await.is_none());
    assert!(TcpStream::connect(addr).await.is_err());
}
