//! WebSocket close codes

/// Reason sent with an application-requested close
pub const REQUESTED_CLOSE_REASON: &str = "Requested close";

/// Code sent when the client drops a connection it intends to resume
pub const RECONNECT_CLOSE_CODE: u16 = 4000;

wire_codes! {
    /// Close codes with a meaning to this client
    ///
    /// Anything outside the table (1001, 1006, ...) still reconnects.
    pub enum CloseCode: u16 {
        /// The only code that ends the client for good
        Normal = 1000 => "Normal closure",
        UnknownError = 4000 => "Unknown error",
        UnknownOpcode = 4001 => "Unknown opcode",
        DecodeError = 4002 => "Decode error",
        NotAuthenticated = 4003 => "Not authenticated",
        AuthenticationFailed = 4004 => "Authentication failed",
        AlreadyAuthenticated = 4005 => "Already authenticated",
        InvalidSequence = 4007 => "Invalid sequence number",
        RateLimited = 4008 => "Rate limited",
        SessionTimedOut = 4009 => "Session timed out",
        InvalidShard = 4010 => "Invalid shard",
        ShardingRequired = 4011 => "Sharding required",
        InvalidApiVersion = 4012 => "Invalid API version",
        InvalidIntents = 4013 => "Invalid intents",
        DisallowedIntents = 4014 => "Disallowed intents",
    }
}

impl CloseCode {
    #[must_use]
    pub const fn is_normal(code: u16) -> bool {
        code == Self::Normal.code()
    }

    /// Retrying will fail the same way until the client is reconfigured
    #[must_use]
    pub const fn is_configuration_error(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    /// False when the server has discarded the session and the next connection must identify
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        !(matches!(self, Self::InvalidSequence | Self::SessionTimedOut)
            || self.is_configuration_error())
    }
}
