pub mod channel;
pub mod constants;
pub mod entity;
pub mod error;

pub use channel::Channel;
pub use constants::*;
pub use entity::{ContentItem, Entity, EntityId, Notification};
pub use error::{Result, SyncError};
