//! Test helpers for integration tests
//!
//! Provides a local chat room server, client construction shortcuts and
//! polling assertions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chat_realtime::testing::RecordingHandler;
use chat_realtime::{ConnectionHandle, ConnectionManager, ReconnectConfig, TokioScheduler, WebSocketTransport};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Chat message that makes the server answer with a non-JSON frame
pub const GARBAGE_TRIGGER: &str = "!garbage";

/// Sender identity the test server stamps on broadcasts
pub const TEST_USER: &str = "tester";

#[derive(Clone)]
struct RoomState {
    room: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
    accepted: Arc<AtomicUsize>,
    tokens: Arc<Mutex<Vec<Option<String>>>>,
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

/// Minimal chat room server speaking the client's wire protocol
pub struct TestChatServer {
    pub addr: SocketAddr,
    state: RoomState,
    _handle: JoinHandle<()>,
}

impl TestChatServer {
    /// Start a server on an ephemeral local port
    pub async fn start() -> Result<Self> {
        let (room, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = RoomState {
            room,
            kick,
            accepted: Arc::new(AtomicUsize::new(0)),
            tokens: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/ws/chat/:room/", get(room_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Page origin for address resolution
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute socket URL for a room
    pub fn room_url(&self, room: &str) -> String {
        format!("ws://{}/ws/chat/{room}/", self.addr)
    }

    /// Number of WebSocket upgrades accepted so far
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// `token` query values seen, one per accepted connection
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.state.tokens.lock().clone()
    }

    /// Close every open connection with a normal close frame
    pub fn kick_all(&self) {
        let _ = self.state.kick.send(());
    }
}

async fn room_handler(
    State(state): State<RoomState>,
    Path(room): Path<String>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    state.accepted.fetch_add(1, Ordering::SeqCst);
    state.tokens.lock().push(params.token);
    ws.on_upgrade(move |socket| handle_socket(state, room, socket))
}

async fn handle_socket(state: RoomState, room: String, mut socket: WebSocket) {
    let mut broadcasts = state.room.subscribe();
    let mut kick = state.kick.subscribe();

    let joined = json!({
        "type": "user_event",
        "message": format!("{TEST_USER} joined {room}"),
        "event": "user_joined",
    });
    if socket.send(Message::Text(joined.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_text(&state, &text) {
                        if socket.send(Message::Text(reply)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            },
            Ok(frame) = broadcasts.recv() => {
                if socket.send(Message::Text(frame)).await.is_err() {
                    return;
                }
            }
            _ = kick.recv() => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: 1000,
                        reason: "kicked".into(),
                    })))
                    .await;
                return;
            }
        }
    }
}

/// Returns a direct reply to the sender, broadcasting chat messages
fn handle_text(state: &RoomState, text: &str) -> Option<String> {
    let Ok(data) = serde_json::from_str::<Value>(text) else {
        return Some(json!({ "error": "Invalid JSON" }).to_string());
    };

    let message = data.get("message").and_then(Value::as_str)?;
    if message == GARBAGE_TRIGGER {
        return Some("this is not json".to_string());
    }

    let broadcast = json!({
        "type": "chat_message",
        "message": message,
        "sender": { "username": TEST_USER, "id": 1 },
    });
    let _ = state.room.send(broadcast.to_string());
    None
}

/// Shared recording handler
pub type SharedRecorder = Arc<Mutex<RecordingHandler>>;

/// Spawn a real-network client against `address`
pub fn spawn_client(address: &str, config: ReconnectConfig) -> (ConnectionHandle, SharedRecorder) {
    let recorder = SharedRecorder::default();
    let manager = ConnectionManager::new(
        address,
        config,
        WebSocketTransport::new(),
        TokioScheduler::new(),
        recorder.clone(),
    );
    (ConnectionHandle::spawn(manager), recorder)
}

/// Reconnect policy short enough for tests
pub fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig::new(
        Duration::from_millis(20),
        Duration::from_millis(80),
        max_attempts,
    )
}

/// Address of a local port with nothing listening
pub async fn unreachable_address() -> Result<String> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("ws://{addr}/ws/chat/general/"))
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
