//! # chord-core
//!
//! Wire data model shared by the REST client and the gateway.
//! This crate has no I/O; it only describes what travels over the wire.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Activity, ActivityType, Emoji, GuildMember, Role, User, UserStatus};
pub use value_objects::{Permissions, Snowflake, SnowflakeParseError};
