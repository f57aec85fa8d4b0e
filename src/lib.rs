//! # Capsule Sync
//!
//! A real-time sync client for capsule rooms and notification feeds:
//! JSON frames over an authenticated WebSocket, a per-channel entity
//! snapshot kept current by last-write-wins reduction, automatic
//! reconnection, and a REST fallback that feeds the same reducer.
//!
//! ## Example
//!
//! ```no_run
//! use capsule_sync::{SyncClient, SyncClientOptions, TopicEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SyncClient::new(
//!         "wss://capsule.example/sync",
//!         SyncClientOptions {
//!             credential: "jwt-token".into(),
//!             ..Default::default()
//!         },
//!     )?;
//!
//!     let room = client.open_capsule(42).await?;
//!     let mut updates = room.subscribe(&room.channel().primary_topic()).await;
//!     while let Ok(event) = updates.events.recv().await {
//!         if let TopicEvent::Snapshot(delta) = event {
//!             println!("{delta:?}: {} items", room.snapshot().await.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod reconciler;
pub mod session;
pub mod subscription;
pub mod types;
pub mod websocket;

pub use client::{Credential, SyncClient, SyncClientBuilder, SyncClientOptions};
pub use messaging::{ClientFrame, ServerEvent, SessionNotice, TopicEvent};
pub use reconciler::{EntitySnapshot, SnapshotDelta, StateReconciler};
pub use session::{ChannelSession, RetrySchedule, SessionState};
pub use subscription::{SubscriptionId, TopicSubscription};
pub use types::{Channel, ContentItem, Entity, EntityId, Notification, Result, SyncError};
