use crate::types::constants::{destinations, topics};

/// A logical real-time scope: one user's notification feed, or one
/// capsule's collaborative content room.
///
/// A channel is immutable once a session is opened for it; switching
/// channels means opening a new session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Per-user notification feed.
    Notifications { username: String },
    /// Shared content room for a single capsule.
    CapsuleRoom { capsule_id: i64 },
}

impl Channel {
    pub fn notifications(username: impl Into<String>) -> Self {
        Self::Notifications {
            username: username.into(),
        }
    }

    pub fn capsule_room(capsule_id: i64) -> Self {
        Self::CapsuleRoom { capsule_id }
    }

    /// The topic carrying this channel's entity events
    /// (`initial`/`update`/`delete`).
    pub fn primary_topic(&self) -> String {
        match self {
            Self::Notifications { username } => format!("{}/{}", topics::NOTIFICATIONS, username),
            Self::CapsuleRoom { capsule_id } => format!("{}/{}", topics::CAPSULE, capsule_id),
        }
    }

    /// The side-channel topic carrying unread-count updates. Only the
    /// notification feed has one.
    pub fn count_topic(&self) -> Option<String> {
        match self {
            Self::Notifications { username } => {
                Some(format!("{}/{}", topics::NOTIFICATION_COUNT, username))
            }
            Self::CapsuleRoom { .. } => None,
        }
    }

    /// Every topic a freshly opened session subscribes to.
    pub fn default_topics(&self) -> Vec<String> {
        let mut all = vec![self.primary_topic()];
        all.extend(self.count_topic());
        all
    }

    /// The send destination for this channel's connect announcement.
    pub fn connect_destination(&self) -> &'static str {
        match self {
            Self::Notifications { .. } => destinations::NOTIFICATIONS_CONNECT,
            Self::CapsuleRoom { .. } => destinations::CAPSULE_CONNECT,
        }
    }

    /// The capsule id this channel is scoped to, when it is a room.
    pub fn capsule_id(&self) -> Option<i64> {
        match self {
            Self::Notifications { .. } => None,
            Self::CapsuleRoom { capsule_id } => Some(*capsule_id),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notifications { username } => write!(f, "notifications:{}", username),
            Self::CapsuleRoom { capsule_id } => write!(f, "capsule:{}", capsule_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_channel_topics() {
        let channel = Channel::notifications("alice");
        assert_eq!(channel.primary_topic(), "/topic/notifications/alice");
        assert_eq!(
            channel.count_topic().as_deref(),
            Some("/topic/notifications/count/alice")
        );
        assert_eq!(channel.default_topics().len(), 2);
        assert_eq!(channel.connect_destination(), "/app/notifications/connect");
        assert_eq!(channel.capsule_id(), None);
    }

    #[test]
    fn capsule_room_topics() {
        let channel = Channel::capsule_room(42);
        assert_eq!(channel.primary_topic(), "/topic/capsule/42");
        assert_eq!(channel.count_topic(), None);
        assert_eq!(channel.default_topics(), vec!["/topic/capsule/42"]);
        assert_eq!(channel.capsule_id(), Some(42));
    }
}
