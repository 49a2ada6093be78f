//! Session identity
//!
//! Survives resumable reconnects; cleared on an invalid session.

use chord_common::ShardInfo;
use serde::{Deserialize, Serialize};

/// Session identity used to decide between identify and resume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub session_id: Option<String>,
    pub last_sequence: Option<u64>,
    pub shard: Option<ShardInfo>,
}

impl GatewaySession {
    #[must_use]
    pub fn new(shard: Option<ShardInfo>) -> Self {
        Self {
            session_id: None,
            last_sequence: None,
            shard,
        }
    }

    /// Restore a session saved from an earlier run
    #[must_use]
    pub fn resume_from(session_id: impl Into<String>, last_sequence: u64) -> Self {
        Self {
            session_id: Some(session_id.into()),
            last_sequence: Some(last_sequence),
            shard: None,
        }
    }

    /// Both a session id and a sequence are needed to resume
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.last_sequence.is_some()
    }

    /// Forget the session so the next handshake identifies
    pub fn clear(&mut self) {
        self.session_id = None;
        self.last_sequence = None;
    }
}
