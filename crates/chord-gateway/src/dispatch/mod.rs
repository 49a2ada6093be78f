//! Event dispatch
//!
//! Routes decoded dispatch frames to application handlers.

mod dispatcher;

pub use dispatcher::{EventDispatcher, HandlerFuture};
