use crate::reconciler::SnapshotDelta;
use crate::types::channel::Channel;
use crate::types::entity::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frame kinds this client understands. Anything else is counted and
/// dropped without touching state.
const KNOWN_KINDS: [&str; 5] = ["initial", "update", "delete", "user_list", "count_update"];

/// First decode pass: pull out the `type` tag alone so an unknown kind
/// can be told apart from a malformed frame of a known kind.
#[derive(Debug, Deserialize)]
pub struct KindProbe {
    #[serde(rename = "type")]
    pub kind: String,
}

impl KindProbe {
    pub fn is_known(&self) -> bool {
        KNOWN_KINDS.contains(&self.kind.as_str())
    }
}

/// A server-to-client event, tagged by `type` on the wire.
///
/// Both channels speak the same vocabulary: a notification feed carries
/// `Notification` values where a capsule room carries `ContentItem`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: serde::de::DeserializeOwned"
))]
pub enum ServerEvent<T> {
    /// Complete snapshot; replaces local state wholesale.
    Initial {
        #[serde(rename = "capsuleId", default, skip_serializing_if = "Option::is_none")]
        capsule_id: Option<i64>,
        contents: Vec<T>,
        #[serde(rename = "eventId", default, skip_serializing_if = "Option::is_none")]
        event_id: Option<Uuid>,
    },

    /// Upsert of a single entity.
    Update {
        #[serde(rename = "capsuleId", default, skip_serializing_if = "Option::is_none")]
        capsule_id: Option<i64>,
        content: T,
        #[serde(rename = "eventId", default, skip_serializing_if = "Option::is_none")]
        event_id: Option<Uuid>,
    },

    /// Removal by id.
    Delete {
        #[serde(rename = "capsuleId", default, skip_serializing_if = "Option::is_none")]
        capsule_id: Option<i64>,
        #[serde(rename = "contentId")]
        content_id: EntityId,
        #[serde(rename = "eventId", default, skip_serializing_if = "Option::is_none")]
        event_id: Option<Uuid>,
    },

    /// Roster of users currently connected to the room.
    UserList { users: Vec<String> },

    /// Unread-count side channel.
    CountUpdate { count: u64 },
}

impl<T> ServerEvent<T> {
    /// The de-duplication id, when the server attached one.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            Self::Initial { event_id, .. }
            | Self::Update { event_id, .. }
            | Self::Delete { event_id, .. } => *event_id,
            Self::UserList { .. } | Self::CountUpdate { .. } => None,
        }
    }

    /// Whether this event mutates the entity snapshot (as opposed to
    /// the user-list / count side channels).
    pub fn is_snapshot_event(&self) -> bool {
        matches!(
            self,
            Self::Initial { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

/// A client-to-server frame, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Announces the client on a channel right after subscribing.
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        #[serde(rename = "capsuleId", default, skip_serializing_if = "Option::is_none")]
        capsule_id: Option<i64>,
    },

    Subscribe {
        topic: String,
    },

    Unsubscribe {
        topic: String,
    },

    /// Create-or-update of one content item, de-duplicated server side
    /// by `eventId`.
    ContentUpdate {
        #[serde(rename = "capsuleId")]
        capsule_id: i64,
        content: serde_json::Value,
        #[serde(rename = "eventId")]
        event_id: Uuid,
    },

    ContentDelete {
        #[serde(rename = "capsuleId")]
        capsule_id: i64,
        #[serde(rename = "contentId")]
        content_id: EntityId,
        #[serde(rename = "eventId")]
        event_id: Uuid,
    },

    MarkRead {
        topic: String,
        #[serde(rename = "notificationId")]
        notification_id: EntityId,
    },

    MarkAllRead {
        topic: String,
    },
}

impl ClientFrame {
    /// The connect announcement for a channel. Capsule rooms are scoped
    /// by id; the notification feed is addressed by its destination.
    pub fn connect(channel: &Channel) -> Self {
        match channel.capsule_id() {
            Some(capsule_id) => Self::Connect {
                topic: None,
                capsule_id: Some(capsule_id),
            },
            None => Self::Connect {
                topic: Some(channel.connect_destination().to_string()),
                capsule_id: None,
            },
        }
    }

    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// Builds a content update with a fresh event id.
    pub fn content_update(capsule_id: i64, content: serde_json::Value) -> Self {
        Self::ContentUpdate {
            capsule_id,
            content,
            event_id: Uuid::new_v4(),
        }
    }

    /// Builds a content delete with a fresh event id.
    pub fn content_delete(capsule_id: i64, content_id: EntityId) -> Self {
        Self::ContentDelete {
            capsule_id,
            content_id,
            event_id: Uuid::new_v4(),
        }
    }
}

/// What a topic subscriber receives after the reducer has run.
#[derive(Debug, Clone)]
pub enum TopicEvent {
    /// The snapshot changed; the delta says how.
    Snapshot(SnapshotDelta),
    /// Current room roster.
    UserList(Vec<String>),
    /// Current unread count.
    Count(u64),
}

/// Out-of-band session happenings that are not tied to a single topic.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    /// Unread count observed with no count-topic subscriber to take it.
    UnreadCount(u64),
    /// The transport dropped; reconnection is underway unless the cap
    /// was already reached.
    ConnectionLost { reason: Option<String> },
    /// One topic's subscribe frame could not be sent. The registration
    /// stands and is retried on the next reconnect.
    SubscriptionFailed { topic: String, error: String },
    /// Every allowed reconnect attempt failed; the session stays
    /// `Failed` until reopened manually.
    ReconnectExhausted { attempts: u32 },
    /// The server refused the credential. Reconnection stops; a fresh
    /// `open` with a valid credential is the only way back.
    AuthRejected { error: String },
}
