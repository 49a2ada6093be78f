//! Role permission bits

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::snowflake::IdRepr;

bitflags! {
    /// Permission set carried on a role
    ///
    /// Travels as a decimal string. Bits this client does not know are dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        const CREATE_INSTANT_INVITE = 0x0000_0001;
        const KICK_MEMBERS          = 0x0000_0002;
        const BAN_MEMBERS           = 0x0000_0004;
        const ADMINISTRATOR         = 0x0000_0008;
        const MANAGE_CHANNELS       = 0x0000_0010;
        const MANAGE_GUILD          = 0x0000_0020;
        const ADD_REACTIONS         = 0x0000_0040;
        const VIEW_AUDIT_LOG        = 0x0000_0080;
        const VIEW_CHANNEL          = 0x0000_0400;
        const SEND_MESSAGES         = 0x0000_0800;
        const SEND_TTS_MESSAGES     = 0x0000_1000;
        const MANAGE_MESSAGES       = 0x0000_2000;
        const EMBED_LINKS           = 0x0000_4000;
        const ATTACH_FILES          = 0x0000_8000;
        const READ_MESSAGE_HISTORY  = 0x0001_0000;
        const MENTION_EVERYONE      = 0x0002_0000;
        const USE_EXTERNAL_EMOJIS   = 0x0004_0000;
        const CONNECT               = 0x0010_0000;
        const SPEAK                 = 0x0020_0000;
        const CHANGE_NICKNAME       = 0x0400_0000;
        const MANAGE_NICKNAMES      = 0x0800_0000;
        const MANAGE_ROLES          = 0x1000_0000;
        const MANAGE_EMOJIS         = 0x4000_0000;
        const MANAGE_WEBHOOKS       = 0x2000_0000;
    }
}

impl Permissions {
    /// True when every bit of `required` is granted, or the set is administrative
    #[inline]
    #[must_use]
    pub fn has(self, required: Permissions) -> bool {
        self.contains(Self::ADMINISTRATOR) || self.contains(required)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.bits(), f)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IdRepr::deserialize(deserializer)?
            .into_u64()
            .map(Self::from_bits_truncate)
            .ok_or_else(|| serde::de::Error::custom("expected a permission bit string"))
    }
}
