//! Emoji entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Custom or unicode emoji
///
/// Unicode emoji have no `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    #[serde(rename = "roles", default)]
    pub role_ids: Vec<Snowflake>,
    #[serde(default)]
    pub require_colons: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    /// Check whether this is a guild custom emoji
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.id.is_some()
    }
}
