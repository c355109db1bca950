// tests/integration/protocol_test.rs

//! End-to-end tests for the line protocol: one NUL-terminated response per
//! non-blank line, and data errors never close the connection.

use super::test_helpers::{TestServer, pool_config};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use watergate::core::sink::MemorySink;

#[tokio::test]
async fn test_valid_record_is_acknowledged_and_stored() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    let resp = client
        .request(r#"{"event_type":"  click  ","user_id":42,"page":"/home","props":{"button":"buy"}}"#)
        .await;
    assert_eq!(resp, "OK");

    let records = server.sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.event_type(), "click");
    assert_eq!(record.user_id(), "42");
    assert_eq!(record.source_ip(), Some("127.0.0.1"));
    assert_eq!(
        serde_json::Value::Object(record.props().clone()),
        json!({"page": "/home", "button": "buy"})
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_ok_response_is_nul_terminated_without_newline() {
    let server = TestServer::new().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    stream
        .write_all(b"{\"event_type\":\"click\",\"user_id\":\"u1\"}\n")
        .await
        .unwrap();
    let mut buf = [0u8; 3];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"OK\0");

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_json_keeps_connection_open() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    let resp = client.request(r#"{"event_type": "click", "#).await;
    assert!(resp.starts_with("ERROR: "), "unexpected response: {resp}");

    let resp = client
        .request(r#"{"event_type":"click","user_id":"u1"}"#)
        .await;
    assert_eq!(resp, "OK");
    assert_eq!(server.sink.records().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_validation_errors_are_reported_verbatim() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    let cases = [
        (r#"{"user_id":"u1"}"#, "ERROR: event_type must be a non-empty string"),
        (r#"{"event_type":"","user_id":"u1"}"#, "ERROR: event_type must be a non-empty string"),
        (r#"{"event_type":"click"}"#, "ERROR: user_id must be a non-empty string"),
        (r#"{"event_type":"click","user_id":"u1","props":7}"#, "ERROR: props must be an object"),
        (r#"[1,2,3]"#, "ERROR: expected an object"),
    ];
    for (line, expected) in cases {
        assert_eq!(client.request(line).await, expected, "line: {line}");
    }

    // Still usable after a run of rejected lines.
    let resp = client
        .request(r#"{"event_type":"click","user_id":"u1"}"#)
        .await;
    assert_eq!(resp, "OK");
    assert_eq!(server.sink.records().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_blank_lines_get_no_response() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    client
        .send_raw(b"\n   \n\t\r\n{\"event_type\":\"a\",\"user_id\":\"u1\"}\n")
        .await;
    assert_eq!(client.read_response().await, "OK");

    // If a blank line had produced a response, this one would be misaligned.
    let resp = client.request(r#"{"event_type":"b","user_id":"u1"}"#).await;
    assert_eq!(resp, "OK");

    let records = server.sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event_type(), "a");
    assert_eq!(records[1].event_type(), "b");

    server.shutdown().await;
}

#[tokio::test]
async fn test_pipelined_lines_are_answered_in_order() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    client
        .send_raw(
            b"{\"event_type\":\"first\",\"user_id\":\"u1\"}\r\n\
              not json\n\
              {\"event_type\":\"third\",\"user_id\":\"u1\"}\n",
        )
        .await;
    assert_eq!(client.read_response().await, "OK");
    assert!(client.read_response().await.starts_with("ERROR: "));
    assert_eq!(client.read_response().await, "OK");

    let types: Vec<String> = server
        .sink
        .records()
        .iter()
        .map(|r| r.event_type().to_string())
        .collect();
    assert_eq!(types, vec!["first", "third"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_backend_rejection_is_reported_for_that_record_only() {
    let sink = MemorySink::new().rejecting("boom");
    let server = TestServer::with(sink, pool_config(1, 2, Duration::from_secs(2))).await;
    let mut client = server.connect().await;

    let resp = client.request(r#"{"event_type":"boom","user_id":"u1"}"#).await;
    assert_eq!(resp, "ERROR: insert rejected for event_type 'boom'");

    let resp = client.request(r#"{"event_type":"fine","user_id":"u1"}"#).await;
    assert_eq!(resp, "OK");
    assert_eq!(server.sink.records().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_partial_line_at_disconnect_gets_no_response() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    client.send_raw(br#"{"event_type":"click","user_id":"u1"}"#).await;
    let rest = client.finish().await;

    assert!(rest.is_empty(), "expected no response, got {rest:?}");
    assert!(server.sink.records().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_is_a_decode_error() {
    let server = TestServer::new().await;
    let mut client = server.connect().await;

    client.send_raw(b"\xff\xfe\xfd\n").await;
    assert!(client.read_response().await.starts_with("ERROR: "));

    let resp = client.request(r#"{"event_type":"click","user_id":"u1"}"#).await;
    assert_eq!(resp, "OK");

    server.shutdown().await;
}
