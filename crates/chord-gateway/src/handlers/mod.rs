//! Inbound frame handling
//!
//! The state machine decides between identify and resume, restarts the heartbeat on every hello,
//! and routes dispatch frames to the [`EventDispatcher`](crate::dispatch::EventDispatcher).

mod handshake;
mod state_machine;

pub use handshake::HandshakeConfig;
pub use state_machine::{FrameOutcome, GatewayStateMachine};
