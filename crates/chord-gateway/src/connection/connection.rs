//! A single gateway connection
//!
//! The handle is replaced, never reused, on every reconnect.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::GatewayFrame;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// Bootstrapping and opening the socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established
    Ready,
    /// Tearing the connection down
    Closing,
    /// No connection
    #[default]
    Closed,
}

impl ConnectionState {
    /// Check if a socket is currently open
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(
            self,
            Self::AwaitingHello | Self::Identifying | Self::Resuming | Self::Ready
        )
    }
}

/// Outbound side of one live connection
///
/// Frames sent here are drained into the socket by the connection's writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    sender: mpsc::Sender<GatewayFrame>,
    opened_at: Instant,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(id: u64, sender: mpsc::Sender<GatewayFrame>) -> Self {
        Self {
            id,
            sender,
            opened_at: Instant::now(),
        }
    }

    /// Attempt number of this connection, starting at 1
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get connection age
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Queue a frame for the socket
    pub async fn send(&self, frame: GatewayFrame) -> GatewayResult<()> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    /// Get a clone of the sender channel
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<GatewayFrame> {
        self.sender.clone()
    }
}
