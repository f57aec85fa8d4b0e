use crate::messaging::event::ServerEvent;
use crate::reconciler::snapshot::{EntitySnapshot, EventIdRing, SnapshotDelta};
use crate::types::channel::Channel;
use crate::types::constants::EVENT_ID_HISTORY;
use crate::types::entity::Entity;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Owns the per-channel entity snapshots and is the only writer to
/// them. Every mutation, whether it arrived over the socket or was
/// seeded from a REST fetch, goes through [`apply`].
///
/// [`apply`]: StateReconciler::apply
pub struct StateReconciler<T> {
    channels: RwLock<HashMap<Channel, ChannelSlot<T>>>,
}

struct ChannelSlot<T> {
    snapshot: EntitySnapshot<T>,
    seen: EventIdRing,
}

impl<T> ChannelSlot<T> {
    fn new() -> Self {
        Self {
            snapshot: EntitySnapshot::default(),
            seen: EventIdRing::new(EVENT_ID_HISTORY),
        }
    }
}

impl<T: Entity> StateReconciler<T> {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Runs one event through the reducer and reports what changed.
    ///
    /// Holding the write lock across the whole reduction serializes
    /// concurrent writers, so arrival order is the only order.
    pub async fn apply(&self, channel: &Channel, event: &ServerEvent<T>) -> SnapshotDelta {
        let mut channels = self.channels.write().await;
        let slot = channels
            .entry(channel.clone())
            .or_insert_with(ChannelSlot::new);

        if let Some(event_id) = event.event_id()
            && !slot.seen.insert(event_id)
        {
            tracing::debug!(%channel, %event_id, "discarding duplicate event");
            return SnapshotDelta::Unchanged;
        }

        match event {
            ServerEvent::Initial { contents, .. } => SnapshotDelta::Replaced {
                count: slot.snapshot.replace_all(contents.iter().cloned()),
            },
            ServerEvent::Update { content, .. } => SnapshotDelta::Upserted {
                id: slot.snapshot.upsert(content.clone()),
            },
            ServerEvent::Delete { content_id, .. } => SnapshotDelta::Removed {
                id: *content_id,
                existed: slot.snapshot.remove(*content_id),
            },
            ServerEvent::UserList { .. } | ServerEvent::CountUpdate { .. } => {
                SnapshotDelta::Unchanged
            }
        }
    }

    /// Seeds a channel from out-of-band data, typically a REST fetch
    /// used when the live channel cannot be established. Behaves
    /// exactly like an `initial` frame off the socket.
    pub async fn seed_initial(&self, channel: &Channel, items: Vec<T>) -> SnapshotDelta {
        let event = ServerEvent::Initial {
            capsule_id: channel.capsule_id(),
            contents: items,
            event_id: None,
        };
        self.apply(channel, &event).await
    }

    /// Current entities on a channel, sorted by id. Reflects every
    /// `apply` that has returned.
    pub async fn current_snapshot(&self, channel: &Channel) -> Vec<T> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|slot| slot.snapshot.values_sorted())
            .unwrap_or_default()
    }

    /// One entity by id, when present.
    pub async fn entity(&self, channel: &Channel, id: crate::types::entity::EntityId) -> Option<T> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .and_then(|slot| slot.snapshot.get(id).cloned())
    }

    /// Drops a channel's snapshot and de-dup history. Called on
    /// explicit channel close, never on transient disconnect.
    pub async fn clear(&self, channel: &Channel) {
        self.channels.write().await.remove(channel);
    }
}

impl<T: Entity> Default for StateReconciler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entity::ContentItem;
    use serde_json::json;
    use uuid::Uuid;

    fn item(id: i64, caption: &str) -> ContentItem {
        serde_json::from_value(json!({"id": id, "caption": caption})).unwrap()
    }

    fn update(content: ContentItem, event_id: Option<Uuid>) -> ServerEvent<ContentItem> {
        ServerEvent::Update {
            capsule_id: Some(1),
            content,
            event_id,
        }
    }

    #[tokio::test]
    async fn initial_replaces_wholesale() {
        let reconciler = StateReconciler::new();
        let channel = Channel::capsule_room(1);

        reconciler
            .apply(&channel, &update(item(10, "stale"), None))
            .await;
        let delta = reconciler
            .apply(
                &channel,
                &ServerEvent::Initial {
                    capsule_id: Some(1),
                    contents: vec![item(1, "a"), item(2, "b")],
                    event_id: None,
                },
            )
            .await;

        assert_eq!(delta, SnapshotDelta::Replaced { count: 2 });
        let snapshot = reconciler.current_snapshot(&channel).await;
        assert_eq!(snapshot.len(), 2);
        assert!(reconciler.entity(&channel, 10).await.is_none());
    }

    #[tokio::test]
    async fn delete_of_absent_id_is_a_no_op() {
        let reconciler: StateReconciler<ContentItem> = StateReconciler::new();
        let channel = Channel::capsule_room(1);

        let delta = reconciler
            .apply(
                &channel,
                &ServerEvent::Delete {
                    capsule_id: Some(1),
                    content_id: 404,
                    event_id: None,
                },
            )
            .await;

        assert_eq!(
            delta,
            SnapshotDelta::Removed {
                id: 404,
                existed: false
            }
        );
    }

    #[tokio::test]
    async fn duplicate_event_ids_are_discarded() {
        let reconciler = StateReconciler::new();
        let channel = Channel::capsule_room(1);
        let event_id = Some(Uuid::new_v4());

        let first = reconciler
            .apply(&channel, &update(item(1, "v1"), event_id))
            .await;
        let second = reconciler
            .apply(&channel, &update(item(1, "v2"), event_id))
            .await;

        assert_eq!(first, SnapshotDelta::Upserted { id: 1 });
        assert_eq!(second, SnapshotDelta::Unchanged);
        let entity = reconciler.entity(&channel, 1).await.unwrap();
        assert_eq!(entity.fields["caption"], json!("v1"));
    }

    #[tokio::test]
    async fn side_channels_leave_the_snapshot_alone() {
        let reconciler = StateReconciler::new();
        let channel = Channel::capsule_room(1);
        reconciler
            .apply(&channel, &update(item(1, "a"), None))
            .await;

        let delta = reconciler
            .apply(
                &channel,
                &ServerEvent::UserList {
                    users: vec!["alice".into()],
                },
            )
            .await;

        assert_eq!(delta, SnapshotDelta::Unchanged);
        assert_eq!(reconciler.current_snapshot(&channel).await.len(), 1);
    }

    #[tokio::test]
    async fn seed_initial_matches_socket_initial() {
        let reconciler = StateReconciler::new();
        let channel = Channel::capsule_room(1);

        let delta = reconciler
            .seed_initial(&channel, vec![item(1, "a"), item(2, "b")])
            .await;

        assert_eq!(delta, SnapshotDelta::Replaced { count: 2 });
        assert_eq!(reconciler.current_snapshot(&channel).await.len(), 2);
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let reconciler = StateReconciler::new();
        let room_a = Channel::capsule_room(1);
        let room_b = Channel::capsule_room(2);

        reconciler.apply(&room_a, &update(item(1, "a"), None)).await;

        assert!(reconciler.current_snapshot(&room_b).await.is_empty());
        reconciler.clear(&room_a).await;
        assert!(reconciler.current_snapshot(&room_a).await.is_empty());
    }
}
