//! # chord-gateway
//!
//! Gateway client: keeps one WebSocket connection alive, identifies or resumes the session,
//! heartbeats on the server's interval and hands dispatch events to application handlers.
//!
//! ```no_run
//! use chord_common::ClientConfig;
//! use chord_gateway::{EventDispatcher, GatewayClient, MessageCreate};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.on(|message: MessageCreate| async move {
//!     println!("{}: {}", message.author.tag(), message.content);
//!     Ok(())
//! });
//!
//! let handle = GatewayClient::builder(ClientConfig::from_env()?)
//!     .dispatcher(dispatcher)
//!     .build()?
//!     .connect()
//!     .await?;
//! tokio::signal::ctrl_c().await?;
//! handle.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod heartbeat;
pub mod lifecycle;
pub mod protocol;

pub use client::{GatewayClient, GatewayClientBuilder, GatewayHandle};
pub use connection::{ConnectionHandle, ConnectionState, GatewaySession};
pub use dispatch::EventDispatcher;
pub use error::{GatewayError, GatewayResult};
pub use events::{
    EventPayload, GatewayEvent, GuildEmojisUpdate, GuildMemberAdd, GuildMemberUpdate,
    GuildRoleCreate, GuildRoleDelete, MessageCreate, PresenceUpdate, Ready, Resumed,
};
pub use handlers::{FrameOutcome, GatewayStateMachine, HandshakeConfig};
pub use heartbeat::{HeartbeatError, HeartbeatScheduler};
pub use lifecycle::{LifecycleListener, NoopLifecycle};
pub use protocol::{CloseCode, GatewayFrame, OpCode, RequestGuildMembers, UpdateStatus};
