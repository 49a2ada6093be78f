//! Test helpers for integration tests
//!
//! Provides a fake service (REST bootstrap plus WebSocket gateway) and a lifecycle recorder.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chord_common::ClientConfig;
use chord_gateway::{
    ConnectionState, GatewayError, GatewayFrame, GatewayHandle, LifecycleListener, OpCode,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::fixtures::TEST_TOKEN;

/// Default wait for anything the client should do
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// What the client did on a server-side connection
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Frame(GatewayFrame),
    /// The client closed, with its close code if it sent one
    Closed(Option<u16>),
}

enum ServerAction {
    Send(GatewayFrame),
    Close { code: u16, reason: String },
}

struct FakeState {
    addr: SocketAddr,
    expected_auth: String,
    bootstrap_requests: AtomicUsize,
    throttle_next: AtomicBool,
    connections: mpsc::UnboundedSender<ServerConnection>,
}

/// In-process fake of the service
pub struct FakeGateway {
    pub addr: SocketAddr,
    state: Arc<FakeState>,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    _handle: JoinHandle<()>,
}

impl FakeGateway {
    /// Start a fake service on a free local port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (connections_tx, connections) = mpsc::unbounded_channel();

        let state = Arc::new(FakeState {
            addr,
            expected_auth: format!("Bot {TEST_TOKEN}"),
            bootstrap_requests: AtomicUsize::new(0),
            throttle_next: AtomicBool::new(false),
            connections: connections_tx,
        });

        let app = Router::new()
            .route("/api/gateway/bot", get(gateway_bot))
            .route("/gateway", get(gateway_socket))
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            connections,
            _handle: handle,
        })
    }

    /// Client configuration pointing at this server
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(TEST_TOKEN)
            .with_api_base_url(format!("http://{}/api", self.addr))
            .with_reconnect_delay_ms(20)
    }

    /// Number of bootstrap calls served so far
    pub fn bootstrap_requests(&self) -> usize {
        self.state.bootstrap_requests.load(Ordering::SeqCst)
    }

    /// Answer the next bootstrap call with a 429
    pub fn throttle_next_bootstrap(&self) {
        self.state.throttle_next.store(true, Ordering::SeqCst);
    }

    /// Wait for the client to open a socket
    pub async fn next_connection(&mut self) -> Result<ServerConnection> {
        tokio::time::timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("server stopped")
    }

    /// Check that the client stays away for `window`
    pub async fn no_connection_within(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.connections.recv())
            .await
            .is_err()
    }
}

/// Server side of one client socket
pub struct ServerConnection {
    events: mpsc::UnboundedReceiver<ClientEvent>,
    actions: mpsc::UnboundedSender<ServerAction>,
}

impl ServerConnection {
    pub fn send(&self, frame: GatewayFrame) {
        let _ = self.actions.send(ServerAction::Send(frame));
    }

    /// Send a close frame; the socket stays readable until the client answers
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.actions.send(ServerAction::Close {
            code,
            reason: reason.to_string(),
        });
    }

    pub async fn next_event(&mut self) -> Result<ClientEvent> {
        tokio::time::timeout(STEP_TIMEOUT, self.events.recv())
            .await
            .context("timed out waiting for the client")?
            .context("connection task ended")
    }

    /// Next frame with op `op`, skipping heartbeats
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayFrame> {
        loop {
            match self.next_event().await? {
                ClientEvent::Frame(frame) if frame.op == op => return Ok(frame),
                ClientEvent::Frame(frame) if frame.op == OpCode::Heartbeat => {}
                ClientEvent::Frame(frame) => bail!("expected {op}, got {frame}"),
                ClientEvent::Closed(code) => bail!("expected {op}, client closed with {code:?}"),
            }
        }
    }

    /// Wait for the client's close, skipping any frames
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let ClientEvent::Closed(code) = self.next_event().await? {
                return Ok(code);
            }
        }
    }
}

async fn gateway_bot(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.bootstrap_requests.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == state.expected_auth);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "401: Unauthorized", "code": 0})),
        )
            .into_response();
    }

    if state.throttle_next.swap(false, Ordering::SeqCst) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 50.0,
                "global": false
            })),
        )
            .into_response();
    }

    let now = chrono::Utc::now();
    let mut response = Json(json!({
        "url": format!("ws://{}/gateway", state.addr),
        "shards": 1,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": 1
        }
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from_static("5"));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4"));
    if let Ok(reset) = HeaderValue::from_str(&(now.timestamp() + 1).to_string()) {
        headers.insert("x-ratelimit-reset", reset);
    }
    if let Ok(date) = HeaderValue::from_str(&now.to_rfc2822()) {
        headers.insert(header::DATE, date);
    }
    response
}

async fn gateway_socket(State(state): State<Arc<FakeState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_connection(state, socket))
}

async fn serve_connection(state: Arc<FakeState>, mut socket: WebSocket) {
    let (events, events_rx) = mpsc::unbounded_channel();
    let (actions_tx, mut actions) = mpsc::unbounded_channel();
    let connection = ServerConnection {
        events: events_rx,
        actions: actions_tx,
    };
    if state.connections.send(connection).is_err() {
        return;
    }

    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = GatewayFrame::from_json(&text) {
                        let _ = events.send(ClientEvent::Frame(frame));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = events.send(ClientEvent::Closed(frame.map(|frame| frame.code)));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => {
                    let _ = events.send(ClientEvent::Closed(None));
                    break;
                }
            },
            action = actions.recv() => match action {
                Some(ServerAction::Send(frame)) => {
                    let Ok(json) = frame.to_json() else { continue };
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Some(ServerAction::Close { code, reason }) => {
                    let frame = CloseFrame { code, reason: reason.into() };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                }
                None => break,
            },
        }
    }
}

/// Lifecycle notification as recorded by [`RecordingLifecycle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started(u64),
    Closing(u16),
    Closed { code: u16, will_reconnect: bool },
    Failed(String),
}

/// Lifecycle listener that records every notification
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }
}

impl LifecycleListener for RecordingLifecycle {
    fn started(&self, attempt: u64) {
        self.events.lock().push(LifecycleEvent::Started(attempt));
    }

    fn closing(&self, code: u16, _reason: &str) {
        self.events.lock().push(LifecycleEvent::Closing(code));
    }

    fn closed(&self, code: u16, _reason: &str, will_reconnect: bool) {
        self.events.lock().push(LifecycleEvent::Closed {
            code,
            will_reconnect,
        });
    }

    fn failed(&self, error: &GatewayError) {
        self.events
            .lock()
            .push(LifecycleEvent::Failed(error.to_string()));
    }
}

/// Receive from a channel or fail after [`STEP_TIMEOUT`]
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<T> {
    tokio::time::timeout(STEP_TIMEOUT, rx.recv())
        .await
        .context("timed out waiting for an event")?
        .context("channel closed")
}

/// Wait until the client reports `state`, or fail after [`STEP_TIMEOUT`]
pub async fn wait_for_state(handle: &GatewayHandle, state: ConnectionState) -> Result<()> {
    let mut states = handle.watch_state();
    tokio::time::timeout(STEP_TIMEOUT, states.wait_for(|current| *current == state))
        .await
        .with_context(|| format!("timed out waiting for {state:?}"))?
        .context("client stopped")?;
    Ok(())
}
