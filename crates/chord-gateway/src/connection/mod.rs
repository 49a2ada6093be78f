//! Connection state
//!
//! The per-connection outbound handle and the session that survives resumable reconnects.

mod connection;
mod session;

pub use connection::{ConnectionHandle, ConnectionState};
pub use session::GatewaySession;
