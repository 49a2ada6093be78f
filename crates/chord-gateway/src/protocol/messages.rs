//! Gateway frame format
//!
//! [`GatewayFrame`] is the raw `{op, d, s, t}` envelope in both directions. Inbound frames are
//! narrowed to [`ServerFrame`] before the state machine looks at them.

use super::{
    HelloPayload, IdentifyPayload, OpCode, RequestGuildMembers, ResumePayload, UpdateStatus,
};
use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Operation code
    pub op: OpCode,

    /// Payload, sent as `null` when absent
    #[serde(default)]
    pub d: Option<Value>,

    /// Sequence number (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    fn new(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// A payload that fails to encode is logged and sent as `null`
    fn with_payload<P: Serialize>(op: OpCode, payload: &P) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::new(op, Some(value)),
            Err(e) => {
                warn!(?op, error = %e, "Failed to encode frame payload");
                Self::new(op, None)
            }
        }
    }

    // === Client Frames ===

    /// Heartbeat (op 1) echoing the last seen sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    /// Heartbeat ACK (op 11), the reply to a server-initiated heartbeat
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, None)
    }

    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::with_payload(OpCode::Identify, payload)
    }

    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::with_payload(OpCode::Resume, payload)
    }

    #[must_use]
    pub fn status_update(payload: &UpdateStatus) -> Self {
        Self::with_payload(OpCode::StatusUpdate, payload)
    }

    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembers) -> Self {
        Self::with_payload(OpCode::RequestGuildMembers, payload)
    }

    // === Server Frames ===

    /// Dispatch (op 0)
    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    /// Hello (op 10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::with_payload(OpCode::Hello, &HelloPayload::with_interval(heartbeat_interval))
    }

    /// Reconnect (op 7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, None)
    }

    /// Invalid Session (op 9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayFrame(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayFrame(op={})", self.op)
        }
    }
}

/// Frames the server may send
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Dispatch {
        sequence: u64,
        event: String,
        data: Value,
    },
    Heartbeat,
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Hello(HelloPayload),
    HeartbeatAck,
}

impl TryFrom<GatewayFrame> for ServerFrame {
    type Error = GatewayError;

    fn try_from(frame: GatewayFrame) -> GatewayResult<Self> {
        match frame.op {
            OpCode::Dispatch => {
                let event = frame.t.ok_or_else(|| {
                    GatewayError::Compatibility("dispatch frame without event name".to_string())
                })?;
                let sequence = frame.s.ok_or_else(|| {
                    GatewayError::Compatibility(format!("dispatch {event} without sequence"))
                })?;
                let data = frame.d.ok_or_else(|| {
                    GatewayError::Compatibility(format!("dispatch {event} without event data"))
                })?;
                Ok(Self::Dispatch {
                    sequence,
                    event,
                    data,
                })
            }
            OpCode::Heartbeat => Ok(Self::Heartbeat),
            OpCode::Reconnect => Ok(Self::Reconnect),
            OpCode::InvalidSession => Ok(Self::InvalidSession {
                resumable: frame.d.as_ref().and_then(Value::as_bool).unwrap_or(false),
            }),
            OpCode::Hello => {
                let data = frame.d.ok_or_else(|| {
                    GatewayError::Compatibility("hello frame without payload".to_string())
                })?;
                let hello = serde_json::from_value(data).map_err(|e| {
                    GatewayError::Compatibility(format!("malformed hello payload: {e}"))
                })?;
                Ok(Self::Hello(hello))
            }
            OpCode::HeartbeatAck => Ok(Self::HeartbeatAck),
            OpCode::Identify
            | OpCode::StatusUpdate
            | OpCode::VoiceStateUpdate
            | OpCode::VoiceServerPing
            | OpCode::Resume
            | OpCode::RequestGuildMembers => Err(GatewayError::Compatibility(format!(
                "client-only op code {} received from server",
                frame.op
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no wire form"))
        }
    }

    #[test]
    fn test_unencodable_payload_sends_null() {
        let frame = GatewayFrame::with_payload(OpCode::StatusUpdate, &Unencodable);
        assert_eq!(frame.op, OpCode::StatusUpdate);
        assert_eq!(frame.d, None);
        assert_eq!(frame.to_json().unwrap(), r#"{"op":3,"d":null}"#);
    }

    #[test]
    fn test_heartbeat_carries_sequence() {
        let json = GatewayFrame::heartbeat(Some(42)).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":42}"#);

        let json = GatewayFrame::heartbeat(None).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_parse_server_dispatch() {
        let frame = GatewayFrame::from_json(
            r#"{"op":0,"d":{"content":"hi"},"s":7,"t":"MESSAGE_CREATE"}"#,
        )
        .unwrap();

        let server = ServerFrame::try_from(frame).unwrap();
        assert_eq!(
            server,
            ServerFrame::Dispatch {
                sequence: 7,
                event: "MESSAGE_CREATE".to_string(),
                data: serde_json::json!({"content": "hi"}),
            }
        );
    }

    #[test]
    fn test_dispatch_without_data_is_compatibility_fault() {
        let frame = GatewayFrame::from_json(r#"{"op":0,"d":null,"s":7,"t":"READY"}"#).unwrap();
        assert!(matches!(
            ServerFrame::try_from(frame),
            Err(GatewayError::Compatibility(_))
        ));
    }

    #[test]
    fn test_hello_parses_interval() {
        let frame = GatewayFrame::from_json(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert_eq!(
            ServerFrame::try_from(frame).unwrap(),
            ServerFrame::Hello(HelloPayload::with_interval(41250))
        );
    }

    #[test]
    fn test_client_only_opcodes_rejected() {
        for op in [2u8, 3, 4, 5, 6, 8] {
            let frame = GatewayFrame::from_json(&format!(r#"{{"op":{op},"d":null}}"#)).unwrap();
            assert!(
                matches!(ServerFrame::try_from(frame), Err(GatewayError::Compatibility(_))),
                "op {op} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_session_flag() {
        let frame = GatewayFrame::invalid_session(true);
        assert_eq!(
            ServerFrame::try_from(frame).unwrap(),
            ServerFrame::InvalidSession { resumable: true }
        );

        let frame = GatewayFrame::from_json(r#"{"op":9}"#).unwrap();
        assert_eq!(
            ServerFrame::try_from(frame).unwrap(),
            ServerFrame::InvalidSession { resumable: false }
        );
    }

    #[test]
    fn test_frame_display() {
        let dispatch = GatewayFrame::dispatch("MESSAGE_CREATE", 5, serde_json::json!({}));
        let display = format!("{dispatch}");
        assert!(display.contains("MESSAGE_CREATE"));
        assert!(display.contains("s=5"));
    }
}
