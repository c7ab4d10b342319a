//! Counter store provider implementations

pub mod memory;
pub mod unavailable;

#[cfg(feature = "redis-store")]
pub mod redis;

pub use memory::InMemoryMemberStore;
pub use unavailable::UnavailableMemberStore;

#[cfg(feature = "redis-store")]
pub use self::redis::RedisMemberStore;
