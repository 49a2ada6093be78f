//! Identify and resume payload construction

use chord_common::{ClientConfig, ShardInfo};

use crate::connection::GatewaySession;
use crate::protocol::{IdentifyPayload, IdentifyProperties, ResumePayload, UpdateStatus};

/// Everything needed to authenticate a new connection
#[derive(Clone)]
pub struct HandshakeConfig {
    pub token: String,
    pub intents: u64,
    pub large_threshold: u32,
    pub shard: Option<ShardInfo>,
    pub properties: IdentifyProperties,
    pub presence: Option<UpdateStatus>,
}

impl HandshakeConfig {
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            intents: config.intents,
            large_threshold: config.large_threshold,
            shard: config.shard,
            properties: IdentifyProperties::default(),
            presence: None,
        }
    }

    /// Set the presence announced with identify
    #[must_use]
    pub fn with_presence(mut self, presence: UpdateStatus) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Build a fresh-session identify payload
    #[must_use]
    pub fn identify(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            properties: self.properties.clone(),
            compress: false,
            large_threshold: self.large_threshold,
            intents: self.intents,
            shard: self.shard,
            presence: self.presence.clone(),
        }
    }

    /// Build a resume payload, or `None` if the session cannot be resumed
    #[must_use]
    pub fn resume(&self, session: &GatewaySession) -> Option<ResumePayload> {
        Some(ResumePayload {
            token: self.token.clone(),
            session_id: session.session_id.clone()?,
            seq: session.last_sequence?,
        })
    }
}

impl std::fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .finish_non_exhaustive()
    }
}
