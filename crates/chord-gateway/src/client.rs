//! Gateway client and reconnect supervisor
//!
//! [`GatewayClient::connect`] opens the first connection and hands the rest of the client's life
//! to a supervisor task. The supervisor runs one connection at a time: bootstrap the URL over
//! REST, open the socket, feed frames to the [`GatewayStateMachine`], then tear down and either
//! reconnect or stop. Only a normal closure (1000) or an application shutdown stops it.

use std::sync::Arc;
use std::time::Duration;

use chord_common::ClientConfig;
use chord_rest::{HttpTransport, RestClient};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn, Instrument};

use crate::connection::{ConnectionHandle, ConnectionState, GatewaySession};
use crate::dispatch::EventDispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{FrameOutcome, GatewayStateMachine, HandshakeConfig};
use crate::lifecycle::{LifecycleListener, NoopLifecycle};
use crate::protocol::{
    CloseCode, GatewayFrame, RequestGuildMembers, UpdateStatus, RECONNECT_CLOSE_CODE,
    REQUESTED_CLOSE_REASON,
};

/// Channel buffer size for outgoing frames
const OUTBOUND_BUFFER_SIZE: usize = 100;

/// Channel buffer size for handle commands
const COMMAND_BUFFER_SIZE: usize = 16;

/// How long teardown waits for queued frames to be written
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code reported when the socket ends without a close frame
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported for a close frame without a status
const NO_STATUS_CLOSE_CODE: u16 = 1005;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

enum Command {
    Send {
        frame: GatewayFrame,
        reply: oneshot::Sender<GatewayResult<()>>,
    },
    Shutdown,
}

/// Why a connection's receive loop ended
#[derive(Debug)]
enum ConnectionEnd {
    /// The application asked to stop
    Shutdown,
    /// The server asked for a new connection
    Reconnect { resumable: bool },
    /// The server closed the socket
    Closed { code: u16, reason: String },
    /// Transport error or protocol fault
    Failed(GatewayError),
}

// === Builder ===

/// Builder for [`GatewayClient`]
pub struct GatewayClientBuilder {
    config: ClientConfig,
    dispatcher: EventDispatcher,
    lifecycle: Arc<dyn LifecycleListener>,
    transport: Option<Arc<dyn HttpTransport>>,
    session: GatewaySession,
    presence: Option<UpdateStatus>,
}

impl GatewayClientBuilder {
    /// Event handlers to run for dispatch frames
    pub fn dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Listener for connection lifecycle notifications
    pub fn lifecycle(mut self, lifecycle: impl LifecycleListener + 'static) -> Self {
        self.lifecycle = Arc::new(lifecycle);
        self
    }

    /// HTTP transport for the bootstrap call, replacing the default reqwest client
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Session saved from an earlier run; the first connection resumes it
    pub fn session(mut self, session: GatewaySession) -> Self {
        self.session = session;
        self
    }

    /// Presence announced with identify
    pub fn presence(mut self, presence: UpdateStatus) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn build(self) -> GatewayResult<GatewayClient> {
        let rest = match self.transport {
            Some(transport) => RestClient::with_transport(&self.config, transport)?,
            None => RestClient::new(&self.config)?,
        };

        let mut handshake = HandshakeConfig::from_config(&self.config);
        if let Some(presence) = self.presence {
            handshake = handshake.with_presence(presence);
        }

        let machine = GatewayStateMachine::new(handshake, self.session, self.dispatcher);

        Ok(GatewayClient {
            config: self.config,
            rest,
            machine,
            lifecycle: self.lifecycle,
        })
    }
}

// === Client ===

/// Gateway client, not yet connected
pub struct GatewayClient {
    config: ClientConfig,
    rest: RestClient,
    machine: GatewayStateMachine,
    lifecycle: Arc<dyn LifecycleListener>,
}

impl GatewayClient {
    #[must_use]
    pub fn builder(config: ClientConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            config,
            dispatcher: EventDispatcher::new(),
            lifecycle: Arc::new(NoopLifecycle),
            transport: None,
            session: GatewaySession::default(),
            presence: None,
        }
    }

    /// REST client sharing this client's rate limit bucket
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Open the first connection and start the supervisor
    ///
    /// Errors from the first bootstrap or connect are returned here. Failures after that are
    /// retried by the supervisor and reported through the lifecycle listener.
    pub async fn connect(self) -> GatewayResult<GatewayHandle> {
        let span = tracing::info_span!("gateway", shard = ?self.config.shard);
        let mut supervisor = Supervisor {
            rest: self.rest.clone(),
            config: self.config,
            machine: self.machine,
            lifecycle: self.lifecycle,
            attempt: 0,
        };

        let socket = match supervisor.open().instrument(span.clone()).await {
            Ok(socket) => socket,
            Err(e) => {
                supervisor.machine.detach().await;
                supervisor.lifecycle.failed(&e);
                return Err(e);
            }
        };

        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let session = supervisor.machine.watch_session();
        let state = supervisor.machine.watch_state();
        let task = tokio::spawn(supervisor.run(socket, commands_rx).instrument(span));

        Ok(GatewayHandle {
            commands,
            session,
            state,
            rest: self.rest,
            task,
        })
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

// === Handle ===

/// Control handle for a running client
///
/// Dropping the handle shuts the client down as [`close`](Self::close) would, without waiting.
pub struct GatewayHandle {
    commands: mpsc::Sender<Command>,
    session: watch::Receiver<GatewaySession>,
    state: watch::Receiver<ConnectionState>,
    rest: RestClient,
    task: JoinHandle<()>,
}

impl GatewayHandle {
    /// Snapshot of the current session
    #[must_use]
    pub fn session(&self) -> GatewaySession {
        self.session.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that follows connection state changes
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// REST client sharing the gateway's rate limit bucket
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Check if the supervisor has stopped
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Send a frame on the current connection
    ///
    /// Fails with [`GatewayError::ConnectionClosed`] while the client is between connections.
    pub async fn send(&self, frame: GatewayFrame) -> GatewayResult<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, reply })
            .await
            .map_err(|_| GatewayError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| GatewayError::ConnectionClosed)?
    }

    /// Send a status update (op 3)
    pub async fn update_status(&self, status: &UpdateStatus) -> GatewayResult<()> {
        self.send(GatewayFrame::status_update(status)).await
    }

    /// Request guild members (op 8); they arrive as GUILD_MEMBERS_CHUNK events
    pub async fn request_guild_members(&self, request: &RequestGuildMembers) -> GatewayResult<()> {
        self.send(GatewayFrame::request_guild_members(request)).await
    }

    /// Close with a normal closure and wait for the supervisor to exit
    ///
    /// Returns the final session, which can be passed to a later client to resume.
    pub async fn close(self) -> GatewaySession {
        let _ = self.commands.send(Command::Shutdown).await;
        join_supervisor(self.task).await;
        let session = self.session.borrow().clone();
        session
    }

    /// Wait until the supervisor stops on its own (normal closure from the server)
    pub async fn wait(self) -> GatewaySession {
        let Self {
            commands,
            session,
            task,
            ..
        } = self;
        join_supervisor(task).await;
        drop(commands);
        let session = session.borrow().clone();
        session
    }
}

impl std::fmt::Debug for GatewayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandle")
            .field("state", &self.state())
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

async fn join_supervisor(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        if e.is_panic() {
            error!(error = %e, "Gateway supervisor panicked");
        }
    }
}

// === Supervisor ===

struct Supervisor {
    config: ClientConfig,
    rest: RestClient,
    machine: GatewayStateMachine,
    lifecycle: Arc<dyn LifecycleListener>,
    attempt: u64,
}

impl Supervisor {
    async fn run(mut self, first: WsStream, mut commands: mpsc::Receiver<Command>) {
        let mut socket = Some(first);

        loop {
            let ws = match socket.take() {
                Some(ws) => ws,
                None => match self.reconnect(&mut commands).await {
                    Some(ws) => ws,
                    None => break,
                },
            };

            let (end, writer, stream) = self.run_connection(ws, &mut commands).await;
            if !self.teardown(end, writer, stream).await {
                break;
            }
        }

        info!("Gateway client stopped");
    }

    /// Bootstrap the URL and open a socket
    async fn open(&mut self) -> GatewayResult<WsStream> {
        self.attempt += 1;
        self.machine.set_connecting();

        let endpoint = self.rest.gateway_endpoint().await?;
        let url = gateway_url(&endpoint.url, self.config.gateway_version)?;
        debug!(url = %url, attempt = self.attempt, "Connecting to gateway");

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(ws)
    }

    /// Back off, then open a new socket; `None` means shut down
    async fn reconnect(&mut self, commands: &mut mpsc::Receiver<Command>) -> Option<WsStream> {
        loop {
            let delay = self.backoff();
            debug!(delay_ms = delay.as_millis(), "Waiting before reconnect");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = wait_for_shutdown(commands) => return None,
            }

            let opened = tokio::select! {
                opened = self.open() => opened,
                () = wait_for_shutdown(commands) => return None,
            };

            match opened {
                Ok(ws) => return Some(ws),
                Err(e) => {
                    warn!(error = %e, attempt = self.attempt, "Gateway connect failed");
                    self.machine.detach().await;
                    self.lifecycle.failed(&e);
                }
            }
        }
    }

    fn backoff(&self) -> Duration {
        let base = self.config.reconnect_delay();
        let max_jitter = base.as_millis() as u64 / 2;
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        base + Duration::from_millis(jitter)
    }

    async fn run_connection(
        &mut self,
        ws: WsStream,
        commands: &mut mpsc::Receiver<Command>,
    ) -> (ConnectionEnd, JoinHandle<WsSink>, WsSource) {
        let (sink, mut stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let writer = tokio::spawn(write_frames(sink, outbound_rx));

        self.machine
            .attach(ConnectionHandle::new(self.attempt, outbound));
        info!(attempt = self.attempt, "Gateway connected");
        self.lifecycle.started(self.attempt);

        let end = loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => match self.process(&text).await {
                        Ok(FrameOutcome::Continue) => {}
                        Ok(FrameOutcome::Reconnect { resumable }) => {
                            break ConnectionEnd::Reconnect { resumable };
                        }
                        Err(e) => break ConnectionEnd::Failed(e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (NO_STATUS_CLOSE_CODE, String::new()),
                            |frame| (u16::from(frame.code), frame.reason.into_owned()),
                        );
                        break ConnectionEnd::Closed { code, reason };
                    }
                    Some(Ok(Message::Binary(_))) => {
                        break ConnectionEnd::Failed(GatewayError::Compatibility(
                            "binary frame on a json connection".to_string(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break ConnectionEnd::Failed(e.into()),
                    None => {
                        break ConnectionEnd::Closed {
                            code: ABNORMAL_CLOSE_CODE,
                            reason: "stream ended".to_string(),
                        };
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Send { frame, reply }) => {
                        let _ = reply.send(self.machine.send(frame).await);
                    }
                    Some(Command::Shutdown) | None => break ConnectionEnd::Shutdown,
                },
            }
        };

        (end, writer, stream)
    }

    async fn process(&mut self, text: &str) -> GatewayResult<FrameOutcome> {
        let frame = GatewayFrame::from_json(text)?;
        self.machine.handle_frame(frame).await
    }

    /// Close the connection; returns whether to reconnect
    async fn teardown(
        &mut self,
        end: ConnectionEnd,
        writer: JoinHandle<WsSink>,
        stream: WsSource,
    ) -> bool {
        // Sent by the client: (code, reason); `None` when the server already closed.
        let (close_frame, reconnect) = match &end {
            ConnectionEnd::Shutdown => {
                info!("Closing gateway connection");
                (
                    Some((CloseCode::Normal.code(), REQUESTED_CLOSE_REASON.to_string())),
                    false,
                )
            }
            ConnectionEnd::Reconnect { resumable } => {
                info!(resumable, "Reconnecting at server request");
                (
                    Some((RECONNECT_CLOSE_CODE, "Reconnecting".to_string())),
                    true,
                )
            }
            ConnectionEnd::Closed { code, reason } => {
                let code = *code;
                let known = CloseCode::try_from(code).ok();
                match known {
                    Some(known) if known.is_configuration_error() => {
                        error!(code, reason = %reason, close = %known, "Gateway rejected configuration");
                    }
                    Some(known) => info!(code, reason = %reason, close = %known, "Gateway closed"),
                    None => info!(code, reason = %reason, "Gateway closed"),
                }
                if known.is_some_and(|known| !known.is_resumable()) {
                    self.machine.reset_session();
                }
                self.lifecycle.closing(code, reason);
                (None, !CloseCode::is_normal(code))
            }
            ConnectionEnd::Failed(e) => {
                if e.is_protocol_fault() {
                    error!(error = %e, "Protocol fault, dropping connection");
                } else {
                    warn!(error = %e, "Gateway connection failed");
                }
                self.lifecycle.failed(e);
                (
                    Some((RECONNECT_CLOSE_CODE, "Reconnecting".to_string())),
                    true,
                )
            }
        };

        if let Some((code, reason)) = &close_frame {
            self.lifecycle.closing(*code, reason);
        }

        // Stopping the heartbeat and dropping the handle closes the writer's channel.
        self.machine.detach().await;
        let sink = drain_writer(writer).await;

        if let (Some(mut sink), Some((code, reason))) = (sink, close_frame.clone()) {
            let frame = CloseFrame {
                code: code.into(),
                reason: reason.into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!(error = %e, "Failed to send close frame");
            }
            let _ = sink.close().await;
        }
        drop(stream);

        match end {
            ConnectionEnd::Closed { code, reason } => {
                self.lifecycle.closed(code, &reason, reconnect);
            }
            ConnectionEnd::Shutdown | ConnectionEnd::Reconnect { .. } => {
                if let Some((code, reason)) = close_frame {
                    self.lifecycle.closed(code, &reason, reconnect);
                }
            }
            ConnectionEnd::Failed(_) => {}
        }

        reconnect
    }
}

/// Drain queued frames into the socket; returns the sink once every sender is gone
async fn write_frames(mut sink: WsSink, mut outbound: mpsc::Receiver<GatewayFrame>) -> WsSink {
    while let Some(frame) = outbound.recv().await {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, op = %frame.op, "Failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json)).await {
            debug!(error = %e, "Socket write failed, writer exiting");
            break;
        }
    }
    sink
}

async fn drain_writer(mut writer: JoinHandle<WsSink>) -> Option<WsSink> {
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(sink)) => Some(sink),
        Ok(Err(e)) => {
            error!(error = %e, "Writer task failed");
            None
        }
        Err(_) => {
            warn!("Writer did not drain in time");
            writer.abort();
            None
        }
    }
}

/// Resolve once a shutdown is requested; sends issued meanwhile are refused
async fn wait_for_shutdown(commands: &mut mpsc::Receiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Send { reply, .. }) => {
                let _ = reply.send(Err(GatewayError::ConnectionClosed));
            }
            Some(Command::Shutdown) | None => return,
        }
    }
}

/// Append the protocol version and encoding to a bootstrapped URL
fn gateway_url(base: &str, version: u8) -> GatewayResult<String> {
    if !(base.starts_with("ws://") || base.starts_with("wss://")) {
        return Err(GatewayError::InvalidUrl(base.to_string()));
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    Ok(format!("{base}{separator}v={version}&encoding=json"))
}
