//! Gateway events
//!
//! Dispatch event names and the typed payloads handlers can subscribe to.

mod event_types;
mod payloads;

pub use event_types::GatewayEvent;
pub use payloads::{
    EventPayload, GuildEmojisUpdate, GuildMemberAdd, GuildMemberUpdate, GuildRoleCreate,
    GuildRoleDelete, MessageCreate, PartialUser, PresenceUpdate, Ready, Resumed,
    UnavailableGuild,
};
