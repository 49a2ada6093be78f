//! # chord-rest
//!
//! REST side of the client: every HTTP call passes through [`RestClient`], which waits on the
//! shared [`RateLimitTracker`], retries throttled responses and classifies failures into
//! [`ApiError`].

pub mod client;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod transport;

pub use client::RestClient;
pub use error::{ApiError, ApiResult, Throttle};
pub use models::{GatewayEndpoint, SessionStartLimit};
pub use rate_limit::{RateLimitBucket, RateLimitTracker};
pub use transport::{
    FileAttachment, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport,
    TransportError,
};
