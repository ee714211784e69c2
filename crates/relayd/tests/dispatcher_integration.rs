//! Integration tests for the dispatcher.
//!
//! These drive `spawn_dispatcher` through `DispatcherHandle` and check the
//! registry and reader lifecycle as a whole.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

mod common;

use std::collections::HashSet;

use relay_core::{ClientId, RelayConfig};
use relayd::client::Client;
use relayd::dispatcher::DispatcherError;
use relayd::reader::ReaderState;

use common::start_relay;

// ============================================================================
// Occupancy
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admit_remove_keeps_exact_occupancy() {
    let (relay, _script) = start_relay(RelayConfig::default()).await;

    let mut tasks = Vec::new();
    for n in 0..64u64 {
        let relay = relay.clone();
        tasks.push(tokio::spawn(async move {
            let (client, rx) = relay.new_client(None);
            let id = client.id;
            relay.dispatcher().admit(client).await.unwrap();
            if n % 2 == 0 {
                relay.dispatcher().remove(id).await.unwrap();
                None
            } else {
                Some((id, rx))
            }
        }));
    }

    let mut kept = Vec::new();
    for task in tasks {
        if let Some(entry) = task.await.unwrap() {
            kept.push(entry);
        }
    }

    assert_eq!(relay.dispatcher().client_count().await, 32);

    let listed: HashSet<ClientId> = relay
        .dispatcher()
        .list_clients()
        .await
        .into_iter()
        .map(|info| info.id)
        .collect();
    let expected: HashSet<ClientId> = kept.iter().map(|(id, _)| *id).collect();
    assert_eq!(listed, expected);

    let stats = relay.dispatcher().stats();
    assert_eq!(stats.clients_admitted, 64);
    assert_eq!(stats.clients_removed, 32);
}

#[tokio::test]
async fn test_reader_running_iff_occupied() {
    let (relay, _script) = start_relay(RelayConfig::default()).await;
    let dispatcher = relay.dispatcher();
    assert_eq!(dispatcher.reader_state(), ReaderState::Stopped);

    let (a, _rx_a) = relay.new_client(None);
    let (b, _rx_b) = relay.new_client(None);
    let (a_id, b_id) = (a.id, b.id);

    dispatcher.admit(a).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Running);

    dispatcher.admit(b).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Running);

    dispatcher.remove(a_id).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Running);

    dispatcher.remove(b_id).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Stopped);

    let (c, _rx_c) = relay.new_client(None);
    let c_id = c.id;
    dispatcher.admit(c).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Running);

    dispatcher.remove(c_id).await.unwrap();
    assert_eq!(dispatcher.reader_state(), ReaderState::Stopped);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_duplicate_admit_is_rejected() {
    let (relay, _script) = start_relay(RelayConfig::default()).await;

    let (client, _rx) = relay.new_client(None);
    let id = client.id;
    relay.dispatcher().admit(client.clone()).await.unwrap();

    let result = relay.dispatcher().admit(client).await;
    assert_eq!(result, Err(DispatcherError::AlreadyAdmitted(id)));
    assert_eq!(relay.dispatcher().client_count().await, 1);
}

#[tokio::test]
async fn test_remove_twice_fails_second_time() {
    let (relay, _script) = start_relay(RelayConfig::default()).await;

    let (client, _rx) = relay.new_client(None);
    let id = client.id;
    relay.dispatcher().admit(client).await.unwrap();

    relay.dispatcher().remove(id).await.unwrap();
    let result = relay.dispatcher().remove(id).await;
    assert_eq!(result, Err(DispatcherError::ClientNotFound(id)));
}

// ============================================================================
// Inspection
// ============================================================================

#[tokio::test]
async fn test_list_clients_reports_peer() {
    let (relay, _script) = start_relay(RelayConfig::default()).await;

    let peer = "192.0.2.10:50000".parse().unwrap();
    let (client, _rx) = Client::new(ClientId::next(), Some(peer), 4);
    let id = client.id;
    relay.dispatcher().admit(client).await.unwrap();

    let clients = relay.dispatcher().list_clients().await;
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, id);
    assert_eq!(clients[0].peer, Some(peer));
}
