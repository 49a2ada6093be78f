//! Subscriber setup for the client's `tracing` output
//!
//! `RUST_LOG` wins when set. Otherwise the configured level applies to the client crates while
//! the WebSocket and HTTP stacks underneath are held at `warn`.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::Environment;

/// Dependencies that log every frame or request at debug
const NOISY_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "hyper", "hyper_util", "reqwest"];

/// Output options for the subscriber
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the client's own crates
    pub level: Level,
    /// One JSON object per line instead of human-readable text
    pub json: bool,
    /// Log span open and close (shows connection and dispatch lifetimes)
    pub span_events: bool,
    pub file_line: bool,
    pub thread_names: bool,
    /// Include the module path of each event
    pub target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            file_line: false,
            thread_names: false,
            target: true,
        }
    }
}

impl TracingConfig {
    /// Verbose text output for local runs
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            file_line: true,
            thread_names: true,
            ..Self::default()
        }
    }

    /// JSON lines at info
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::production(),
            Environment::Staging => Self::default(),
            Environment::Development => Self::development(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Filter used when `RUST_LOG` is unset
    #[must_use]
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = vec![level];
        directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
        directives.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_target(self.target)
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_thread_names(self.thread_names)
            .with_span_events(span_events);

        if self.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }
}

/// Install the default subscriber
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// Install a subscriber built from `config`
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_config(config: TracingConfig) {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .init();
}

/// Like [`init_tracing`], but reports a second installation instead of panicking
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}
