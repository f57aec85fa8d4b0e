//! Client facade: configuration, credential handling, and the session
//! cache.

pub mod builder;
pub mod core;

pub use builder::{Credential, SyncClientBuilder, SyncClientOptions};
pub use core::SyncClient;
