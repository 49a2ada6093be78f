//! Gateway client demo
//!
//! Run with:
//! ```bash
//! CHORD_TOKEN=... cargo run -p chord-gateway
//! ```
//!
//! Configuration is loaded from environment variables. Logs every message it sees until Ctrl+C.

use chord_common::{init_tracing_with_config, ClientConfig, TracingConfig};
use chord_gateway::{
    EventDispatcher, GatewayClient, GatewayError, LifecycleListener, MessageCreate, Ready,
};
use tracing::{error, info, warn};

struct LogLifecycle;

impl LifecycleListener for LogLifecycle {
    fn started(&self, attempt: u64) {
        info!(attempt, "Connection started");
    }

    fn closed(&self, code: u16, reason: &str, will_reconnect: bool) {
        info!(code, reason, will_reconnect, "Connection closed");
    }

    fn failed(&self, error: &GatewayError) {
        warn!(error = %error, "Connection failed");
    }
}

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing_with_config(TracingConfig::for_environment(config.env));

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!(config = ?config, "Starting gateway client");

    let mut dispatcher = EventDispatcher::new();
    dispatcher
        .on(|ready: Ready| async move {
            info!(
                user = %ready.user.tag(),
                guilds = ready.guilds.len(),
                "Logged in"
            );
            Ok(())
        })
        .on(|message: MessageCreate| async move {
            info!(
                channel = %message.channel_id,
                author = %message.author.tag(),
                content = %message.content,
                "Message"
            );
            Ok(())
        });

    let handle = GatewayClient::builder(config)
        .dispatcher(dispatcher)
        .lifecycle(LogLifecycle)
        .build()?
        .connect()
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let session = handle.close().await;
    info!(session_id = ?session.session_id, sequence = ?session.last_sequence, "Closed");
    Ok(())
}
