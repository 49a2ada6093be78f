//! Integration test utilities for the gateway client
//!
//! [`FakeGateway`] serves the REST bootstrap endpoint and a scripted WebSocket gateway on a local
//! port, so tests can drive the real client end to end.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
