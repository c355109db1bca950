// tests/integration/concurrency_test.rs

//! Concurrent connections sharing one bounded pool.

use super::test_helpers::{TestServer, pool_config, tagged_event};
use std::collections::HashSet;
use std::time::Duration;
use watergate::core::sink::MemorySink;

const CONNECTIONS: usize = 2;
const LINES_PER_CONNECTION: usize = 40;

/// Runs `CONNECTIONS` clients in parallel, each sending its lines one at a time,
/// and checks that every line was stored exactly once and in per-connection order.
async fn run_concurrent_ingest(max_size: usize) {
    let sink = MemorySink::new().with_insert_delay(Duration::from_millis(2));
    let server = TestServer::with(sink, pool_config(1, max_size, Duration::from_secs(5))).await;

    let mut clients = Vec::new();
    for conn in 0..CONNECTIONS {
        let mut client = server.connect().await;
        clients.push(tokio::spawn(async move {
            for seq in 0..LINES_PER_CONNECTION {
                let resp = client.request(&tagged_event(conn, seq)).await;
                assert_eq!(resp, "OK", "conn {conn} seq {seq}");
            }
        }));
    }
    for client in clients {
        client.await.expect("client task panicked");
    }

    let records = server.sink.records();
    assert_eq!(records.len(), CONNECTIONS * LINES_PER_CONNECTION);

    let mut seen = HashSet::new();
    for conn in 0..CONNECTIONS {
        let seqs: Vec<u64> = records
            .iter()
            .filter(|r| r.props()["conn"] == conn as u64)
            .map(|r| r.props()["seq"].as_u64().unwrap())
            .collect();
        let expected: Vec<u64> = (0..LINES_PER_CONNECTION as u64).collect();
        assert_eq!(seqs, expected, "records of conn {conn} lost, duplicated or reordered");
        for seq in seqs {
            assert!(seen.insert((conn, seq)));
        }
    }

    assert!(
        server.sink.peak_in_flight() <= max_size,
        "{} concurrent inserts with max_size {}",
        server.sink.peak_in_flight(),
        max_size
    );
    assert!(server.sink.connects() <= max_size);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_with_single_connection_pool() {
    run_concurrent_ingest(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_with_five_connection_pool() {
    run_concurrent_ingest(5).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_connections_never_exceed_pool_size() {
    let sink = MemorySink::new().with_insert_delay(Duration::from_millis(20));
    let server = TestServer::with(sink, pool_config(0, 3, Duration::from_secs(5))).await;

    let mut clients = Vec::new();
    for conn in 0..12 {
        let mut client = server.connect().await;
        clients.push(tokio::spawn(async move {
            client.request(&tagged_event(conn, 0)).await
        }));
    }
    for client in clients {
        assert_eq!(client.await.unwrap(), "OK");
    }

    assert_eq!(server.sink.records().len(), 12);
    assert!(server.sink.peak_in_flight() <= 3);
    assert!(server.sink.connects() <= 3);

    server.shutdown().await;
}
