//! Gateway end-to-end tests
//!
//! Each test starts a fake service on a local port and drives the real client against it.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use chord_core::UserStatus;
use chord_gateway::{
    ConnectionState, EventDispatcher, GatewayClient, GatewayError, GatewayFrame, GatewayHandle,
    GatewaySession, MessageCreate, OpCode, UpdateStatus,
};
use chord_rest::ApiError;
use integration_tests::{
    message_payload, ready_payload, recv_within, wait_for_state, ClientEvent, FakeGateway,
    LifecycleEvent, RecordingLifecycle, TEST_TOKEN,
};
use serde_json::json;
use tokio::sync::mpsc;

const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Bring a fresh connection up to READY and wait until the client has handled it
async fn identify_and_ready(
    handle: &GatewayHandle,
    conn: &mut integration_tests::ServerConnection,
    session_id: &str,
) -> anyhow::Result<GatewayFrame> {
    conn.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    let identify = conn.expect_op(OpCode::Identify).await?;
    conn.send(GatewayFrame::dispatch("READY", 1, ready_payload(session_id)));
    wait_for_state(handle, ConnectionState::Ready).await?;
    Ok(identify)
}

// ============================================================================
// Handshake and Dispatch
// ============================================================================

#[tokio::test]
async fn test_identify_then_dispatch_reaches_handler() {
    let mut server = FakeGateway::start().await.unwrap();
    let (tx, mut messages) = mpsc::unbounded_channel();

    let mut dispatcher = EventDispatcher::new();
    dispatcher.on(move |message: MessageCreate| {
        let tx = tx.clone();
        async move {
            tx.send(message.content)?;
            Ok(())
        }
    });

    let handle = GatewayClient::builder(server.config())
        .dispatcher(dispatcher)
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    let identify = identify_and_ready(&handle, &mut conn, "session-a").await.unwrap();

    let d = identify.d.unwrap();
    assert_eq!(d["token"], TEST_TOKEN);
    assert_eq!(d["intents"], 513);
    assert_eq!(d["properties"]["$browser"], "chord-gateway");

    conn.send(GatewayFrame::dispatch("MESSAGE_CREATE", 2, message_payload("hello")));
    assert_eq!(recv_within(&mut messages).await.unwrap(), "hello");

    let session = handle.session();
    assert_eq!(session.session_id.as_deref(), Some("session-a"));
    assert_eq!(session.last_sequence, Some(2));
    assert_eq!(handle.state(), ConnectionState::Ready);
    assert_eq!(server.bootstrap_requests(), 1);

    handle.close().await;
}

#[tokio::test]
async fn test_heartbeat_echoes_latest_sequence() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    conn.send(GatewayFrame::hello(100));
    conn.expect_op(OpCode::Identify).await.unwrap();
    conn.send(GatewayFrame::dispatch("READY", 1, ready_payload("s")));
    conn.send(GatewayFrame::dispatch("TYPING_START", 42, json!({})));

    let mut echoed = None;
    while echoed != Some(42) {
        match conn.next_event().await.unwrap() {
            ClientEvent::Frame(frame) if frame.op == OpCode::Heartbeat => {
                echoed = frame.d.and_then(|d| d.as_u64());
            }
            ClientEvent::Frame(_) => {}
            ClientEvent::Closed(code) => panic!("client closed with {code:?}"),
        }
    }

    handle.close().await;
}

#[tokio::test]
async fn test_server_heartbeat_request_is_acked() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut conn, "s").await.unwrap();

    conn.send(GatewayFrame::from_json(r#"{"op":1,"d":null}"#).unwrap());
    conn.expect_op(OpCode::HeartbeatAck).await.unwrap();

    handle.close().await;
}

#[tokio::test]
async fn test_status_update_sent_through_handle() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut conn, "s").await.unwrap();

    let status = UpdateStatus::new(UserStatus::Idle);
    handle.update_status(&status).await.unwrap();

    let frame = conn.expect_op(OpCode::StatusUpdate).await.unwrap();
    assert_eq!(frame.d.unwrap()["status"], "idle");

    handle.close().await;
}

// ============================================================================
// Reconnect and Resume
// ============================================================================

#[tokio::test]
async fn test_server_reconnect_resumes_same_session() {
    let mut server = FakeGateway::start().await.unwrap();
    let lifecycle = RecordingLifecycle::new();
    let handle = GatewayClient::builder(server.config())
        .lifecycle(lifecycle.clone())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut first = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut first, "session-r").await.unwrap();
    first.send(GatewayFrame::dispatch("MESSAGE_CREATE", 2, message_payload("a")));
    first.send(GatewayFrame::reconnect());

    assert_eq!(first.expect_close().await.unwrap(), Some(4000));

    let mut second = server.next_connection().await.unwrap();
    second.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    let resume = second.expect_op(OpCode::Resume).await.unwrap();
    assert_eq!(
        resume.d.unwrap(),
        json!({"token": TEST_TOKEN, "session_id": "session-r", "seq": 2})
    );

    second.send(GatewayFrame::dispatch("RESUMED", 3, json!({})));
    handle.close().await;

    let events = lifecycle.events();
    assert!(events.contains(&LifecycleEvent::Started(1)));
    assert!(events.contains(&LifecycleEvent::Started(2)));
    assert!(events.contains(&LifecycleEvent::Closed {
        code: 4000,
        will_reconnect: true
    }));
    assert_eq!(server.bootstrap_requests(), 2);
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut first = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut first, "session-x").await.unwrap();
    first.send(GatewayFrame::invalid_session(false));
    first.expect_close().await.unwrap();

    let mut second = server.next_connection().await.unwrap();
    second.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    second.expect_op(OpCode::Identify).await.unwrap();

    let session = handle.session();
    assert_eq!(session.session_id, None);
    assert_eq!(session.last_sequence, None);

    handle.close().await;
}

#[tokio::test]
async fn test_saved_session_resumes_on_first_connect() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .session(GatewaySession::resume_from("saved", 77))
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    conn.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    let resume = conn.expect_op(OpCode::Resume).await.unwrap();
    assert_eq!(resume.d.unwrap()["seq"], 77);

    handle.close().await;
}

#[tokio::test]
async fn test_protocol_fault_reconnects() {
    let mut server = FakeGateway::start().await.unwrap();
    let lifecycle = RecordingLifecycle::new();
    let handle = GatewayClient::builder(server.config())
        .lifecycle(lifecycle.clone())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut first = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut first, "session-p").await.unwrap();
    // Identify is client-only; receiving it means the wire format has drifted.
    first.send(GatewayFrame::from_json(r#"{"op":2,"d":{}}"#).unwrap());
    first.expect_close().await.unwrap();

    let mut second = server.next_connection().await.unwrap();
    second.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    second.expect_op(OpCode::Resume).await.unwrap();

    handle.close().await;
    assert!(lifecycle
        .events()
        .iter()
        .any(|event| matches!(event, LifecycleEvent::Failed(message) if message.contains("compatibility"))));
}

// ============================================================================
// Close Codes
// ============================================================================

#[tokio::test]
async fn test_client_close_is_normal_and_final() {
    let mut server = FakeGateway::start().await.unwrap();
    let lifecycle = RecordingLifecycle::new();
    let handle = GatewayClient::builder(server.config())
        .lifecycle(lifecycle.clone())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut conn, "session-c").await.unwrap();

    let session = handle.close().await;
    assert_eq!(session.session_id.as_deref(), Some("session-c"));

    assert_eq!(conn.expect_close().await.unwrap(), Some(1000));
    assert!(server.no_connection_within(Duration::from_millis(300)).await);
    assert!(lifecycle.events().contains(&LifecycleEvent::Closed {
        code: 1000,
        will_reconnect: false
    }));
}

#[tokio::test]
async fn test_server_normal_close_stops_client() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut conn = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut conn, "session-n").await.unwrap();
    conn.close(1000, "bye");

    tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("client should stop after a normal close");
    assert!(server.no_connection_within(Duration::from_millis(300)).await);
}

#[tokio::test]
async fn test_server_error_close_reconnects() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut first = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut first, "session-e").await.unwrap();
    first.close(4000, "unknown error");

    let mut second = server.next_connection().await.unwrap();
    second.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    second.expect_op(OpCode::Resume).await.unwrap();

    handle.close().await;
}

#[tokio::test]
async fn test_session_timeout_close_reidentifies() {
    let mut server = FakeGateway::start().await.unwrap();
    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut first = server.next_connection().await.unwrap();
    identify_and_ready(&handle, &mut first, "session-t").await.unwrap();
    first.close(4009, "session timed out");

    let mut second = server.next_connection().await.unwrap();
    second.send(GatewayFrame::hello(HEARTBEAT_INTERVAL_MS));
    second.expect_op(OpCode::Identify).await.unwrap();

    handle.close().await;
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_bootstrap_rejects_bad_token() {
    let server = FakeGateway::start().await.unwrap();
    let mut config = server.config();
    config.token = "wrong".to_string();

    let result = GatewayClient::builder(config)
        .build()
        .unwrap()
        .connect()
        .await;

    assert!(matches!(
        result,
        Err(GatewayError::Rest(ApiError::Unauthorized(_)))
    ));
}

#[tokio::test]
async fn test_throttled_bootstrap_is_retried() {
    let mut server = FakeGateway::start().await.unwrap();
    server.throttle_next_bootstrap();

    let handle = GatewayClient::builder(server.config())
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    server.next_connection().await.unwrap();
    assert_eq!(server.bootstrap_requests(), 2);

    handle.close().await;
}
