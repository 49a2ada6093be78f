//! Dispatch event names
//!
//! Dispatches whose `t` is not listed here are dropped before reaching handlers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! gateway_events {
    ($( $group:literal => { $( $variant:ident = $wire:literal ),+ $(,)? } )+) => {
        /// Known dispatch event names (the `t` field)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum GatewayEvent {
            $( $( #[doc = $group] #[serde(rename = $wire)] $variant, )+ )+
        }

        impl GatewayEvent {
            pub const ALL: &'static [Self] = &[ $( $( Self::$variant, )+ )+ ];

            /// Wire name, e.g. `MESSAGE_CREATE`
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $( Self::$variant => $wire, )+ )+
                }
            }

            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $( $wire => Some(Self::$variant), )+ )+
                    _ => None,
                }
            }
        }
    };
}

gateway_events! {
    "Session event" => {
        Ready = "READY",
        Resumed = "RESUMED",
    }
    "Channel event" => {
        ChannelCreate = "CHANNEL_CREATE",
        ChannelUpdate = "CHANNEL_UPDATE",
        ChannelDelete = "CHANNEL_DELETE",
        ChannelPinsUpdate = "CHANNEL_PINS_UPDATE",
    }
    "Guild event" => {
        GuildCreate = "GUILD_CREATE",
        GuildUpdate = "GUILD_UPDATE",
        GuildDelete = "GUILD_DELETE",
        GuildBanAdd = "GUILD_BAN_ADD",
        GuildBanRemove = "GUILD_BAN_REMOVE",
        GuildEmojisUpdate = "GUILD_EMOJIS_UPDATE",
        GuildIntegrationsUpdate = "GUILD_INTEGRATIONS_UPDATE",
        GuildMemberAdd = "GUILD_MEMBER_ADD",
        GuildMemberRemove = "GUILD_MEMBER_REMOVE",
        GuildMemberUpdate = "GUILD_MEMBER_UPDATE",
        GuildMembersChunk = "GUILD_MEMBERS_CHUNK",
        GuildRoleCreate = "GUILD_ROLE_CREATE",
        GuildRoleUpdate = "GUILD_ROLE_UPDATE",
        GuildRoleDelete = "GUILD_ROLE_DELETE",
    }
    "Message event" => {
        MessageCreate = "MESSAGE_CREATE",
        MessageUpdate = "MESSAGE_UPDATE",
        MessageDelete = "MESSAGE_DELETE",
        MessageDeleteBulk = "MESSAGE_DELETE_BULK",
        MessageReactionAdd = "MESSAGE_REACTION_ADD",
        MessageReactionRemove = "MESSAGE_REACTION_REMOVE",
        MessageReactionRemoveAll = "MESSAGE_REACTION_REMOVE_ALL",
    }
    "User event" => {
        PresenceUpdate = "PRESENCE_UPDATE",
        TypingStart = "TYPING_START",
        UserUpdate = "USER_UPDATE",
    }
    "Voice event" => {
        VoiceStateUpdate = "VOICE_STATE_UPDATE",
        VoiceServerUpdate = "VOICE_SERVER_UPDATE",
    }
    "Integration event" => {
        WebhooksUpdate = "WEBHOOKS_UPDATE",
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayEvent {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| format!("unknown dispatch event {name}"))
    }
}
