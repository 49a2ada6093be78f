//! Gateway error types

use chord_rest::ApiError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::heartbeat::HeartbeatError;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server sent something this client does not understand
    #[error("Protocol compatibility fault: {0}")]
    Compatibility(String),

    /// Bootstrap REST call failed
    #[error("Gateway bootstrap failed: {0}")]
    Rest(#[from] ApiError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Heartbeat error: {0}")]
    Heartbeat(#[from] HeartbeatError),

    /// No live connection to send on
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),
}

impl From<tungstenite::Error> for GatewayError {
    fn from(error: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

impl GatewayError {
    /// Faults that mean the wire format has drifted from what this client understands
    #[must_use]
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, Self::Compatibility(_) | Self::Json(_))
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
