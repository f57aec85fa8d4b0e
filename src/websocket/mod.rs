pub mod factory;

pub use factory::{WsStream, connect};
