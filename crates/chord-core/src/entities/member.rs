//! Member entity - a user's membership in a guild

use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::value_objects::Snowflake;

/// Guild member as embedded in member events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: User,
    #[serde(rename = "nick", default)]
    pub nickname: Option<String>,
    #[serde(rename = "roles", default)]
    pub role_ids: Vec<Snowflake>,
    /// ISO-8601 timestamp
    pub joined_at: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

impl GuildMember {
    /// Get display name (nickname if set, otherwise username)
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }
}
