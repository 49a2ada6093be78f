//! Connection lifecycle notifications
//!
//! Callbacks run on the supervisor task and must not block.

use std::sync::Arc;

use crate::error::GatewayError;

/// Observer of connection lifecycle transitions
///
/// Every method defaults to a no-op.
pub trait LifecycleListener: Send + Sync {
    /// A connection opened; `attempt` starts at 1 and grows with every reconnect
    fn started(&self, attempt: u64) {
        let _ = attempt;
    }

    /// The client is tearing a connection down
    fn closing(&self, code: u16, reason: &str) {
        let _ = (code, reason);
    }

    /// A connection closed; `will_reconnect` is false only for a final close
    fn closed(&self, code: u16, reason: &str, will_reconnect: bool) {
        let _ = (code, reason, will_reconnect);
    }

    /// A connection attempt or a live connection failed
    fn failed(&self, error: &GatewayError) {
        let _ = error;
    }
}

/// Listener that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

impl LifecycleListener for NoopLifecycle {}

impl<T: LifecycleListener + ?Sized> LifecycleListener for Arc<T> {
    fn started(&self, attempt: u64) {
        (**self).started(attempt);
    }

    fn closing(&self, code: u16, reason: &str) {
        (**self).closing(code, reason);
    }

    fn closed(&self, code: u16, reason: &str, will_reconnect: bool) {
        (**self).closed(code, reason, will_reconnect);
    }

    fn failed(&self, error: &GatewayError) {
        (**self).failed(error);
    }
}
