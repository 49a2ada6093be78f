//! Wire entities referenced by gateway events and REST responses

mod emoji;
mod member;
mod presence;
mod role;
mod user;

pub use emoji::Emoji;
pub use member::GuildMember;
pub use presence::{Activity, ActivityType, UserStatus};
pub use role::Role;
pub use user::User;
