//! Test fixtures
//!
//! Dispatch payloads shaped like the ones the service sends.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Token the fake server accepts
pub const TEST_TOKEN: &str = "test-token";

/// Counter for unique ids
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique id for test data
pub fn unique_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

pub fn user_json() -> Value {
    json!({
        "id": "80351110224678912",
        "username": "chord-test",
        "discriminator": "0001",
        "avatar": null,
        "bot": true
    })
}

/// READY payload for a new session
pub fn ready_payload(session_id: &str) -> Value {
    json!({
        "v": 10,
        "user": user_json(),
        "session_id": session_id,
        "guilds": [{"id": "41771983423143937", "unavailable": true}]
    })
}

/// MESSAGE_CREATE payload
pub fn message_payload(content: &str) -> Value {
    json!({
        "id": unique_id().to_string(),
        "channel_id": "41771983423143937",
        "author": user_json(),
        "content": content,
        "timestamp": "2024-01-01T00:00:00.000000+00:00",
        "tts": false,
        "mention_everyone": false,
        "mentions": [],
        "pinned": false
    })
}
