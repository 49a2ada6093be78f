//! Typed dispatch payloads
//!
//! Each payload names the event it decodes from through [`EventPayload::EVENT`].

use chord_common::ShardInfo;
use chord_core::{Activity, Emoji, GuildMember, Role, Snowflake, User, UserStatus};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::GatewayEvent;

/// A payload type bound to one dispatch event
pub trait EventPayload: DeserializeOwned + Send + 'static {
    const EVENT: GatewayEvent;
}

// === Connection Events ===

/// READY event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    pub v: u8,
    pub user: User,
    pub session_id: String,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardInfo>,
}

impl EventPayload for Ready {
    const EVENT: GatewayEvent = GatewayEvent::Ready;
}

/// RESUMED event payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resumed {}

impl EventPayload for Resumed {
    const EVENT: GatewayEvent = GatewayEvent::Resumed;
}

/// Guild listed in READY before its GUILD_CREATE arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

// === Message Events ===

/// MESSAGE_CREATE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    /// ISO-8601 timestamp
    pub timestamp: String,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub pinned: bool,
}

impl EventPayload for MessageCreate {
    const EVENT: GatewayEvent = GatewayEvent::MessageCreate;
}

// === Member Events ===

/// GUILD_MEMBER_ADD event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: GuildMember,
}

impl EventPayload for GuildMemberAdd {
    const EVENT: GatewayEvent = GatewayEvent::GuildMemberAdd;
}

/// GUILD_MEMBER_UPDATE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: Snowflake,
    #[serde(rename = "roles")]
    pub role_ids: Vec<Snowflake>,
    pub user: User,
    #[serde(rename = "nick", default)]
    pub nickname: Option<String>,
}

impl EventPayload for GuildMemberUpdate {
    const EVENT: GatewayEvent = GatewayEvent::GuildMemberUpdate;
}

// === Role Events ===

/// GUILD_ROLE_CREATE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleCreate {
    pub guild_id: Snowflake,
    pub role: Role,
}

impl EventPayload for GuildRoleCreate {
    const EVENT: GatewayEvent = GatewayEvent::GuildRoleCreate;
}

/// GUILD_ROLE_DELETE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

impl EventPayload for GuildRoleDelete {
    const EVENT: GatewayEvent = GatewayEvent::GuildRoleDelete;
}

// === Guild Events ===

/// GUILD_EMOJIS_UPDATE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEmojisUpdate {
    pub guild_id: Snowflake,
    pub emojis: Vec<Emoji>,
}

impl EventPayload for GuildEmojisUpdate {
    const EVENT: GatewayEvent = GatewayEvent::GuildEmojisUpdate;
}

// === Presence Events ===

/// User reference in presence updates; only `id` is guaranteed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUser {
    pub id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// PRESENCE_UPDATE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user: PartialUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub status: UserStatus,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl PresenceUpdate {
    /// The first activity, if any
    #[must_use]
    pub fn activity(&self) -> Option<&Activity> {
        self.activities.first()
    }
}

impl EventPayload for PresenceUpdate {
    const EVENT: GatewayEvent = GatewayEvent::PresenceUpdate;
}
