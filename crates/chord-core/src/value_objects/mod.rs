//! Value objects - immutable identifiers and flag sets

mod permissions;
mod snowflake;

pub use permissions::Permissions;
pub use snowflake::{Snowflake, SnowflakeParseError};
