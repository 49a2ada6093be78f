//! Event dispatcher
//!
//! Handlers are registered per [`GatewayEvent`] before the client connects. Every dispatch frame
//! runs in its own task, and every handler in its own child task. A handler that fails or panics
//! is logged and never affects its siblings or later frames.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, trace, warn, Instrument};

use crate::events::{EventPayload, GatewayEvent};

/// Future returned by a registered handler
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

type RawHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Registry of event handlers
///
/// Cloning is cheap; clones share the handler table.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<HashMap<GatewayEvent, Vec<RawHandler>>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a typed event payload
    ///
    /// The payload is decoded inside the handler's own task. A payload that does not match the
    /// event's schema is logged as a compatibility fault for this handler only.
    pub fn on<E, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        E: EventPayload,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.on_raw(E::EVENT, move |data| {
            let handler = Arc::clone(&handler);
            async move {
                let payload: E = serde_json::from_value(data)
                    .with_context(|| format!("compatibility fault decoding {} payload", E::EVENT))?;
                (*handler)(payload).await
            }
        })
    }

    /// Register a handler that receives the undecoded payload
    pub fn on_raw<F, Fut>(&mut self, event: GatewayEvent, handler: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: RawHandler = Arc::new(move |data| Box::pin(handler(data)));
        Arc::make_mut(&mut self.handlers)
            .entry(event)
            .or_default()
            .push(handler);
        self
    }

    /// Number of handlers registered for an event
    #[must_use]
    pub fn handler_count(&self, event: GatewayEvent) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }

    /// Check if any handler is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// Run every handler registered for `event`
    ///
    /// Returns the handle of the spawned dispatch task, or `None` when nothing is registered.
    /// The caller does not need to await it.
    pub fn dispatch(&self, event: GatewayEvent, data: Value) -> Option<JoinHandle<()>> {
        let handlers = match self.handlers.get(&event) {
            Some(handlers) if !handlers.is_empty() => handlers.clone(),
            _ => {
                trace!(event = %event, "No handlers registered");
                return None;
            }
        };

        let span = tracing::debug_span!("dispatch", event = %event);
        let task = async move {
            let mut tasks = JoinSet::new();
            for handler in handlers {
                tasks.spawn(handler(data.clone()));
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = format!("{e:#}"), "Event handler failed"),
                    Err(e) if e.is_panic() => error!(error = %e, "Event handler panicked"),
                    Err(e) => debug!(error = %e, "Event handler cancelled"),
                }
            }
        };

        Some(tokio::spawn(task.instrument(span)))
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<_> = self
            .handlers
            .iter()
            .map(|(event, handlers)| (event.as_str(), handlers.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}
