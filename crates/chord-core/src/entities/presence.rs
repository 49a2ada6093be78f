//! Presence values - status and activities

use serde::{Deserialize, Serialize};
use wire::ActivityTypeRepr;

/// Online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

impl UserStatus {
    /// Get the wire string for this status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

/// Activity kind, sent as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "ActivityTypeRepr", into = "ActivityTypeRepr")]
pub enum ActivityType {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
    /// A kind this client does not know about yet
    Unknown(u8),
}

/// A user activity as shown in presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    /// Create a "Playing ..." activity
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Playing,
            url: None,
        }
    }
}

mod wire {
    use super::ActivityType;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    pub(super) struct ActivityTypeRepr(u8);

    impl From<ActivityTypeRepr> for ActivityType {
        fn from(repr: ActivityTypeRepr) -> Self {
            match repr.0 {
                0 => Self::Playing,
                1 => Self::Streaming,
                2 => Self::Listening,
                3 => Self::Watching,
                4 => Self::Custom,
                5 => Self::Competing,
                other => Self::Unknown(other),
            }
        }
    }

    impl From<ActivityType> for ActivityTypeRepr {
        fn from(kind: ActivityType) -> Self {
            Self(match kind {
                ActivityType::Playing => 0,
                ActivityType::Streaming => 1,
                ActivityType::Listening => 2,
                ActivityType::Watching => 3,
                ActivityType::Custom => 4,
                ActivityType::Competing => 5,
                ActivityType::Unknown(other) => other,
            })
        }
    }
}
