pub mod connection;
pub mod core;
pub mod reconnect;
pub mod state;

pub use connection::{ConnectionManager, SessionState};
pub use core::ChannelSession;
pub use reconnect::{ReconnectPolicy, RetrySchedule};
