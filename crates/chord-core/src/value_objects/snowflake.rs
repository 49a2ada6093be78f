//! Snowflake identifiers
//!
//! Every guild, channel, user and message is keyed by a 64-bit snowflake.
//! The top 42 bits hold the creation time in milliseconds since
//! [`Snowflake::EPOCH`]; the low 22 bits are worker, process and counter
//! fields that clients never need to interpret.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const TIMESTAMP_SHIFT: u32 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(u64);

impl Snowflake {
    /// First millisecond of 2015, UTC
    pub const EPOCH: u64 = 1_420_070_400_000;

    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Zero never names a real object; payloads use it as a placeholder
    #[inline]
    pub const fn is_placeholder(self) -> bool {
        self.0 == 0
    }

    /// Creation time as Unix milliseconds
    #[inline]
    pub const fn unix_millis(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) + Self::EPOCH
    }

    #[must_use]
    pub fn created_at(self) -> Option<DateTime<Utc>> {
        i64::try_from(self.unix_millis())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{input}` is not a snowflake")]
pub struct SnowflakeParseError {
    input: String,
}

impl FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|_| SnowflakeParseError {
            input: s.to_owned(),
        })
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

/// Wire shape of an id: a decimal string, or a bare integer in older payloads
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum IdRepr {
    Int(u64),
    Str(String),
}

impl IdRepr {
    pub(crate) fn into_u64(self) -> Option<u64> {
        match self {
            Self::Int(value) => Some(value),
            Self::Str(text) => text.parse().ok(),
        }
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IdRepr::deserialize(deserializer)?
            .into_u64()
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("expected a non-negative snowflake"))
    }
}
