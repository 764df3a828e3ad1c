//! Connection manager end-to-end tests
//!
//! Each test starts its own chat room server on an ephemeral port, so no
//! external services are needed.
//!
//! Run with: cargo test -p integration-tests --test realtime_tests

use std::time::Duration;

use chat_common::ClientConfig;
use chat_realtime::protocol::{InboundMessage, UserEventKind};
use chat_realtime::testing::HandlerCall;
use chat_realtime::{room_url, ClientError, ConnectionHandle, ConnectionState, OutboundMessage};
use integration_tests::{
    eventually, fast_reconnect, spawn_client, unreachable_address, TestChatServer,
    GARBAGE_TRIGGER, TEST_USER,
};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_for_state(handle: &ConnectionHandle, target: ConnectionState) {
    tokio::time::timeout(TIMEOUT, handle.wait_for(|s| s == target))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {target}"))
        .expect("driver stopped");
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_connects_and_receives_join_event() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));

    wait_for_state(&handle, ConnectionState::Open).await;
    assert!(handle.is_connected());

    eventually(TIMEOUT, || {
        recorder.lock().messages().iter().any(|m| {
            matches!(m, InboundMessage::UserEvent(e) if e.event == UserEventKind::UserJoined)
        })
    })
    .await
    .unwrap();

    assert_eq!(recorder.lock().calls()[0], HandlerCall::Connect);
    handle.close().await;
}

#[tokio::test]
async fn test_room_url_from_config_carries_token() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let origin = server.origin();
    let config = ClientConfig::from_lookup(|key| match key {
        "CHAT_ORIGIN" => Some(origin.clone()),
        "CHAT_ROOM" => Some("lobby".to_string()),
        "CHAT_TOKEN" => Some("secret".to_string()),
        _ => None,
    })
    .unwrap();

    let address = room_url(&config).unwrap();
    assert!(address.starts_with("ws://"));

    let (handle, _recorder) = spawn_client(&address, fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    assert_eq!(server.tokens(), vec![Some("secret".to_string())]);
    handle.close().await;
}

// ============================================================================
// Messaging Tests
// ============================================================================

#[tokio::test]
async fn test_chat_message_round_trip() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    handle.send(OutboundMessage::chat("hello room")).await.unwrap();

    eventually(TIMEOUT, || {
        recorder.lock().messages().iter().any(|m| {
            matches!(
                m,
                InboundMessage::ChatMessage(c)
                    if c.message == "hello room" && c.sender.display_name() == TEST_USER
            )
        })
    })
    .await
    .unwrap();

    handle.close().await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    handle.send(OutboundMessage::chat(GARBAGE_TRIGGER)).await.unwrap();

    eventually(TIMEOUT, || {
        recorder.lock().count(&HandlerCall::Error("DECODE_ERROR")) == 1
    })
    .await
    .unwrap();

    assert_eq!(handle.state(), ConnectionState::Open);
    assert_eq!(recorder.lock().count(&HandlerCall::Disconnect), 0);
    assert_eq!(server.accepted(), 1);
    handle.close().await;
}

#[tokio::test]
async fn test_custom_kind_payload_is_sent() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    // The test server rebroadcasts any frame carrying `message`
    let typing = OutboundMessage::new("typing").with_field("message", "...");
    handle.send(typing).await.unwrap();

    eventually(TIMEOUT, || {
        recorder
            .lock()
            .messages()
            .iter()
            .any(|m| matches!(m, InboundMessage::ChatMessage(c) if c.message == "..."))
    })
    .await
    .unwrap();

    handle.close().await;
}

// ============================================================================
// Reconnection Tests
// ============================================================================

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    server.kick_all();

    eventually(TIMEOUT, || {
        let recorder = recorder.lock();
        recorder.count(&HandlerCall::Disconnect) == 1 && recorder.count(&HandlerCall::Connect) == 2
    })
    .await
    .unwrap();

    wait_for_state(&handle, ConnectionState::Open).await;
    assert_eq!(server.accepted(), 2);
    assert_eq!(recorder.lock().count(&HandlerCall::Error("TRANSPORT_ERROR")), 0);
    handle.close().await;
}

#[tokio::test]
async fn test_gives_up_when_server_unreachable() {
    let address = unreachable_address().await.unwrap();
    let (handle, recorder) = spawn_client(&address, fast_reconnect(2));

    wait_for_state(&handle, ConnectionState::GivenUp).await;
    assert!(!handle.is_connected());
    assert!(!handle.is_connecting());

    let recorder = recorder.lock();
    assert_eq!(recorder.count(&HandlerCall::GiveUp(2)), 1);
    assert_eq!(recorder.count(&HandlerCall::Error("TRANSPORT_ERROR")), 3);
    assert_eq!(recorder.count(&HandlerCall::Connect), 0);
    drop(recorder);

    handle.close().await;
}

#[tokio::test]
async fn test_send_while_disconnected_is_rejected() {
    let address = unreachable_address().await.unwrap();
    let (handle, recorder) = spawn_client(&address, fast_reconnect(0));

    wait_for_state(&handle, ConnectionState::GivenUp).await;

    let err = handle.send(OutboundMessage::chat("anyone?")).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected(ConnectionState::GivenUp)));
    assert_eq!(recorder.lock().count(&HandlerCall::Error("NOT_CONNECTED")), 1);

    handle.close().await;
    assert_eq!(handle.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_force_reconnect_opens_fresh_connection() {
    let server = TestChatServer::start().await.expect("Failed to start server");
    let (handle, recorder) = spawn_client(&server.room_url("general"), fast_reconnect(3));
    wait_for_state(&handle, ConnectionState::Open).await;

    handle.force_reconnect().unwrap();
    eventually(TIMEOUT, || recorder.lock().count(&HandlerCall::Connect) == 2)
        .await
        .unwrap();

    assert_eq!(handle.state(), ConnectionState::Open);
    assert_eq!(server.accepted(), 2);
    // Caller-initiated teardown is not a disconnect
    assert_eq!(recorder.lock().count(&HandlerCall::Disconnect), 0);

    handle.close().await;
}
