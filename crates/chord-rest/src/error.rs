//! REST error types
//!
//! Every non-2xx response is classified into one of these variants.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::transport::TransportError;

/// Result type for REST operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Details of a throttled (429) response
#[derive(Debug, Clone, PartialEq)]
pub struct Throttle {
    pub message: String,
    pub global: bool,
    /// Absolute local time after which the call may be retried
    pub retry_at: DateTime<Utc>,
}

impl Throttle {
    /// Parse a throttled response body, anchoring `retry_after` (milliseconds) at `now`
    ///
    /// A `retry_after` that lands outside the representable time range is rejected as malformed.
    pub fn from_body(body: &[u8], now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Body {
            message: String,
            retry_after: f64,
            global: bool,
        }

        let body: Body = serde_json::from_slice(body)?;
        let retry_at = Some(body.retry_after.max(0.0).ceil())
            .filter(|ms| *ms < i64::MAX as f64)
            .and_then(|ms| chrono::Duration::try_milliseconds(ms as i64))
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| {
                <serde_json::Error as serde::de::Error>::custom(format_args!(
                    "retry_after {} ms is out of range",
                    body.retry_after
                ))
            })?;

        Ok(Self {
            message: body.message,
            global: body.global,
            retry_at,
        })
    }
}

/// REST error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Only surfaces through [`ApiError::RetriesExhausted`] when a retry bound is configured
    #[error("Rate limited: {} (retry at {})", .0.message, .0.retry_at)]
    RateLimited(Throttle),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error ({status}): {body}")]
    InternalServer { status: u16, body: String },

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limit retries exhausted after {retries} retries")]
    RetriesExhausted { retries: u32, last: Throttle },

    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    /// Classify a non-2xx response
    ///
    /// A 429 without a valid throttle body is a decode error.
    pub fn from_response(status: u16, body: &[u8], now: DateTime<Utc>) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();

        match status {
            400 => Self::BadRequest(text),
            401 => Self::Unauthorized(text),
            403 => Self::Forbidden(text),
            404 => Self::NotFound(text),
            429 => match Throttle::from_body(body, now) {
                Ok(throttle) => Self::RateLimited(throttle),
                Err(e) => Self::Decode(e),
            },
            502 => Self::BadGateway(text),
            500..=599 => Self::InternalServer { status, body: text },
            _ => Self::Api { status, body: text },
        }
    }

    /// HTTP status this error was classified from, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) | Self::RetriesExhausted { .. } => Some(429),
            Self::BadGateway(_) => Some(502),
            Self::InternalServer { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) | Self::Encode(_) => None,
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}
