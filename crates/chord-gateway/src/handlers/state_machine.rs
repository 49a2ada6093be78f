//! Gateway connection state machine
//!
//! Owned by the receive loop; every session mutation happens on that one path. Other tasks
//! observe the session, the connection state and the latest sequence through `watch` channels.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::HandshakeConfig;
use crate::connection::{ConnectionHandle, ConnectionState, GatewaySession};
use crate::dispatch::EventDispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{GatewayEvent, Ready};
use crate::heartbeat::HeartbeatScheduler;
use crate::protocol::{GatewayFrame, HelloPayload, ServerFrame};

/// What the receive loop should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading from this connection
    Continue,
    /// Drop this connection and open a new one
    Reconnect { resumable: bool },
}

pub struct GatewayStateMachine {
    handshake: HandshakeConfig,
    connection: Option<ConnectionHandle>,
    heartbeat: HeartbeatScheduler,
    dispatcher: EventDispatcher,
    sequence_tx: watch::Sender<Option<u64>>,
    session_tx: watch::Sender<GatewaySession>,
    state_tx: watch::Sender<ConnectionState>,
    last_ack: Option<Instant>,
}

impl GatewayStateMachine {
    #[must_use]
    pub fn new(
        handshake: HandshakeConfig,
        mut session: GatewaySession,
        dispatcher: EventDispatcher,
    ) -> Self {
        if session.shard.is_none() {
            session.shard = handshake.shard;
        }
        let (sequence_tx, _) = watch::channel(session.last_sequence);
        let (session_tx, _) = watch::channel(session);
        let (state_tx, _) = watch::channel(ConnectionState::Closed);

        Self {
            handshake,
            connection: None,
            heartbeat: HeartbeatScheduler::new(),
            dispatcher,
            sequence_tx,
            session_tx,
            state_tx,
            last_ack: None,
        }
    }

    // === Accessors ===

    /// Snapshot of the current session
    #[must_use]
    pub fn session(&self) -> GatewaySession {
        self.session_tx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that follows every session change
    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<GatewaySession> {
        self.session_tx.subscribe()
    }

    /// Receiver that follows every state change
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// When the server last acknowledged a heartbeat on this connection
    #[must_use]
    pub fn last_heartbeat_ack(&self) -> Option<Instant> {
        self.last_ack
    }

    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    #[must_use]
    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    // === Connection Lifecycle ===

    /// Mark that a new connection is being opened
    pub fn set_connecting(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// Bind a freshly opened connection
    pub fn attach(&mut self, connection: ConnectionHandle) {
        debug!(connection = connection.id(), "Connection attached");
        self.connection = Some(connection);
        self.last_ack = None;
        self.set_state(ConnectionState::AwaitingHello);
    }

    /// Stop the heartbeat and release the current connection
    ///
    /// The heartbeat task has fully exited when this returns.
    pub async fn detach(&mut self) {
        self.set_state(ConnectionState::Closing);
        self.heartbeat.stop().await;
        if let Some(connection) = self.connection.take() {
            debug!(
                connection = connection.id(),
                age_ms = connection.age().as_millis(),
                "Connection detached"
            );
        }
        self.set_state(ConnectionState::Closed);
    }

    /// Forget the session so the next hello identifies
    pub fn reset_session(&mut self) {
        self.session_tx.send_modify(GatewaySession::clear);
        self.sequence_tx.send_replace(None);
    }

    /// Queue a frame on the current connection
    pub async fn send(&self, frame: GatewayFrame) -> GatewayResult<()> {
        match &self.connection {
            Some(connection) => connection.send(frame).await,
            None => Err(GatewayError::ConnectionClosed),
        }
    }

    // === Frame Handling ===

    /// Apply one inbound frame
    ///
    /// A compatibility error means the connection should be dropped; the session is left as is.
    pub async fn handle_frame(&mut self, frame: GatewayFrame) -> GatewayResult<FrameOutcome> {
        trace!(frame = %frame, "Frame received");

        match ServerFrame::try_from(frame)? {
            ServerFrame::Hello(hello) => self.on_hello(hello).await,
            ServerFrame::Dispatch {
                sequence,
                event,
                data,
            } => self.on_dispatch(sequence, &event, data),
            ServerFrame::Heartbeat => {
                debug!("Server requested heartbeat");
                self.send(GatewayFrame::heartbeat_ack()).await?;
                Ok(FrameOutcome::Continue)
            }
            ServerFrame::Reconnect => {
                info!("Server requested reconnect");
                Ok(FrameOutcome::Reconnect { resumable: true })
            }
            ServerFrame::InvalidSession { resumable } => {
                warn!(resumable, "Session invalidated, next connection will identify");
                self.reset_session();
                Ok(FrameOutcome::Reconnect { resumable: false })
            }
            ServerFrame::HeartbeatAck => {
                trace!("Heartbeat acknowledged");
                self.last_ack = Some(Instant::now());
                Ok(FrameOutcome::Continue)
            }
        }
    }

    async fn on_hello(&mut self, hello: HelloPayload) -> GatewayResult<FrameOutcome> {
        let outbound = self
            .connection
            .as_ref()
            .map(ConnectionHandle::sender)
            .ok_or(GatewayError::ConnectionClosed)?;

        let resume = self.handshake.resume(&self.session_tx.borrow());
        if let Some(resume) = resume {
            info!(
                session_id = %resume.session_id,
                sequence = resume.seq,
                "Resuming session"
            );
            self.set_state(ConnectionState::Resuming);
            self.send(GatewayFrame::resume(&resume)).await?;
        } else {
            info!(shard = ?self.handshake.shard, "Identifying new session");
            self.set_state(ConnectionState::Identifying);
            self.send(GatewayFrame::identify(&self.handshake.identify()))
                .await?;
        }

        self.heartbeat.stop().await;
        self.heartbeat.start(
            Duration::from_millis(hello.heartbeat_interval),
            self.sequence_tx.subscribe(),
            outbound,
        )?;

        Ok(FrameOutcome::Continue)
    }

    fn on_dispatch(
        &mut self,
        sequence: u64,
        name: &str,
        data: serde_json::Value,
    ) -> GatewayResult<FrameOutcome> {
        self.sequence_tx.send_replace(Some(sequence));
        self.session_tx
            .send_modify(|session| session.last_sequence = Some(sequence));

        let Some(event) = GatewayEvent::from_name(name) else {
            trace!(event = name, sequence, "Ignoring unknown event");
            return Ok(FrameOutcome::Continue);
        };

        let mut session_id = None;
        match event {
            GatewayEvent::Ready => {
                let ready: Ready = serde_json::from_value(data.clone()).map_err(|e| {
                    GatewayError::Compatibility(format!("malformed READY payload: {e}"))
                })?;
                info!(
                    session_id = %ready.session_id,
                    user = %ready.user.tag(),
                    guilds = ready.guilds.len(),
                    "Session ready"
                );
                session_id = Some(ready.session_id);
                self.set_state(ConnectionState::Ready);
            }
            GatewayEvent::Resumed => {
                info!(sequence, "Session resumed");
                self.set_state(ConnectionState::Ready);
            }
            _ => {}
        }

        if session_id.is_some() {
            self.session_tx
                .send_modify(|session| session.session_id = session_id);
        }

        self.dispatcher.dispatch(event, data);
        Ok(FrameOutcome::Continue)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            trace!(from = ?previous, to = ?state, "Connection state changed");
        }
    }
}

impl std::fmt::Debug for GatewayStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayStateMachine")
            .field("state", &self.state())
            .field("session", &self.session())
            .field("heartbeat_running", &self.heartbeat_running())
            .finish_non_exhaustive()
    }
}
