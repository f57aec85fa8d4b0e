use crate::messaging::event::{KindProbe, ServerEvent, SessionNotice, TopicEvent};
use crate::reconciler::{SnapshotDelta, StateReconciler};
use crate::subscription::SubscriptionRegistry;
use crate::types::channel::Channel;
use crate::types::entity::Entity;
use crate::types::error::{Result, SyncError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Decodes inbound frames and routes them to the reducer or the side
/// channels. One router per session; frames are routed strictly in
/// arrival order because the read task awaits each `route` call.
pub struct MessageRouter<T> {
    channel: Channel,
    reconciler: Arc<StateReconciler<T>>,
    registry: Arc<SubscriptionRegistry>,
    notices: broadcast::Sender<SessionNotice>,
    unknown_frames: AtomicU64,
}

impl<T: Entity + serde::de::DeserializeOwned> MessageRouter<T> {
    pub fn new(
        channel: Channel,
        reconciler: Arc<StateReconciler<T>>,
        registry: Arc<SubscriptionRegistry>,
        notices: broadcast::Sender<SessionNotice>,
    ) -> Self {
        Self {
            channel,
            reconciler,
            registry,
            notices,
            unknown_frames: AtomicU64::new(0),
        }
    }

    /// Handles one raw frame. Unknown kinds are counted and dropped;
    /// a frame that fails to decode is a `Parse` error the caller is
    /// expected to log and move past.
    pub async fn route(&self, raw: &str) -> Result<()> {
        let probe: KindProbe = serde_json::from_str(raw)
            .map_err(|err| SyncError::Parse(format!("frame without a usable type tag: {err}")))?;

        if !probe.is_known() {
            let seen = self.unknown_frames.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                channel = %self.channel,
                kind = %probe.kind,
                total_unknown = seen,
                "dropping frame of unknown kind"
            );
            return Ok(());
        }

        let event: ServerEvent<T> = serde_json::from_str(raw)
            .map_err(|err| SyncError::Parse(format!("malformed '{}' frame: {err}", probe.kind)))?;

        self.dispatch(event).await;
        Ok(())
    }

    async fn dispatch(&self, event: ServerEvent<T>) {
        match event {
            ServerEvent::UserList { users } => {
                let topic = self.channel.primary_topic();
                let delivered = self
                    .registry
                    .dispatch(&topic, TopicEvent::UserList(users))
                    .await;
                tracing::debug!(channel = %self.channel, delivered, "routed user list");
            }
            ServerEvent::CountUpdate { count } => {
                self.deliver_count(count).await;
            }
            snapshot_event => {
                let delta: SnapshotDelta =
                    self.reconciler.apply(&self.channel, &snapshot_event).await;
                // Duplicates and no-op deletes are not worth waking
                // subscribers for.
                if !delta.changed() {
                    return;
                }
                let topic = self.channel.primary_topic();
                let delivered = self
                    .registry
                    .dispatch(&topic, TopicEvent::Snapshot(delta.clone()))
                    .await;
                tracing::debug!(
                    channel = %self.channel,
                    ?delta,
                    delivered,
                    "applied snapshot event"
                );
            }
        }
    }

    /// Counts go to the count topic when someone is listening there,
    /// otherwise out on the session notice stream so they are still
    /// observable.
    async fn deliver_count(&self, count: u64) {
        if let Some(topic) = self.channel.count_topic()
            && self.registry.dispatch(&topic, TopicEvent::Count(count)).await > 0
        {
            return;
        }
        let _ = self.notices.send(SessionNotice::UnreadCount(count));
    }

    /// How many frames were dropped for carrying a kind this client
    /// does not understand.
    pub fn unknown_frame_count(&self) -> u64 {
        self.unknown_frames.load(Ordering::Relaxed)
    }
}
