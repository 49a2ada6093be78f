//! Role entity - a guild role with permissions

use serde::{Deserialize, Serialize};

use crate::value_objects::{Permissions, Snowflake};

/// Role as sent in role events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    /// Check whether this role grants a permission
    #[inline]
    pub fn grants(&self, permission: Permissions) -> bool {
        self.permissions.has(permission)
    }
}
