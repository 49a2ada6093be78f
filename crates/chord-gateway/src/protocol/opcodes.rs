//! Gateway op codes

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

wire_codes! {
    /// The `op` field of every gateway frame
    pub enum OpCode: u8 {
        Dispatch = 0 => "Dispatch",
        /// Sent by both sides; the server uses it to request an immediate beat
        Heartbeat = 1 => "Heartbeat",
        Identify = 2 => "Identify",
        StatusUpdate = 3 => "StatusUpdate",
        VoiceStateUpdate = 4 => "VoiceStateUpdate",
        VoiceServerPing = 5 => "VoiceServerPing",
        Resume = 6 => "Resume",
        Reconnect = 7 => "Reconnect",
        RequestGuildMembers = 8 => "RequestGuildMembers",
        /// `d` says whether the session may be resumed
        InvalidSession = 9 => "InvalidSession",
        /// First frame on a new socket, carries `heartbeat_interval`
        Hello = 10 => "Hello",
        HeartbeatAck = 11 => "HeartbeatAck",
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::try_from(raw).map_err(|op| de::Error::custom(format_args!("unknown op code {op}")))
    }
}
