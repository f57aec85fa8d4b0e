use crate::messaging::event::TopicEvent;
use crate::types::constants::EVENT_STREAM_CAPACITY;
use tokio::sync::RwLock;
use tokio::sync::broadcast;

pub type SubscriptionId = u64;

/// A consumer's handle on one topic: the id to unsubscribe with and the
/// event stream to read from.
#[derive(Debug)]
pub struct TopicSubscription {
    pub id: SubscriptionId,
    pub events: broadcast::Receiver<TopicEvent>,
}

struct Subscription {
    id: SubscriptionId,
    topic: String,
    sender: broadcast::Sender<TopicEvent>,
    active: bool,
}

struct RegistryInner {
    // Registration order is load-bearing: resubscribes replay in the
    // order topics were first registered.
    subscriptions: Vec<Subscription>,
    next_id: SubscriptionId,
}

/// Tracks which topics this session wants, fans events out to their
/// subscribers, and remembers enough to re-establish everything after
/// a reconnect.
///
/// The registry never touches the socket; the owning session reads
/// [`active_topics`] and sends the frames itself.
///
/// [`active_topics`]: SubscriptionRegistry::active_topics
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                subscriptions: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Registers interest in a topic. Topics are unique per session, so
    /// a second registration joins the existing stream instead of
    /// creating a new one. The flag says whether the server still needs
    /// to hear about this topic (fresh registration or reactivation).
    pub async fn register(&self, topic: &str) -> (TopicSubscription, bool) {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .subscriptions
            .iter_mut()
            .find(|sub| sub.topic == topic)
        {
            let needs_frame = !existing.active;
            existing.active = true;
            return (
                TopicSubscription {
                    id: existing.id,
                    events: existing.sender.subscribe(),
                },
                needs_frame,
            );
        }

        let (sender, events) = broadcast::channel(EVENT_STREAM_CAPACITY);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscriptions.push(Subscription {
            id,
            topic: topic.to_string(),
            sender,
            active: true,
        });

        (TopicSubscription { id, events }, true)
    }

    /// Marks a subscription inactive. Returns the topic when something
    /// actually deactivated, so the caller can tell the server; an
    /// unknown or already-inactive id is a no-op.
    pub async fn deactivate(&self, id: SubscriptionId) -> Option<String> {
        let mut inner = self.inner.write().await;
        let sub = inner
            .subscriptions
            .iter_mut()
            .find(|sub| sub.id == id && sub.active)?;
        sub.active = false;
        Some(sub.topic.clone())
    }

    /// Still-active topics in first-registration order.
    pub async fn active_topics(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .subscriptions
            .iter()
            .filter(|sub| sub.active)
            .map(|sub| sub.topic.clone())
            .collect()
    }

    /// Delivers an event to a topic's subscribers. Returns how many
    /// receivers got it; zero when the topic is unknown, inactive, or
    /// nobody is listening.
    pub async fn dispatch(&self, topic: &str, event: TopicEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(sub) = inner
            .subscriptions
            .iter()
            .find(|sub| sub.active && sub.topic == topic)
        else {
            return 0;
        };
        sub.sender.send(event).unwrap_or(0)
    }

    /// Drops every registration. Receivers observe the stream closing.
    pub async fn clear(&self) {
        self.inner.write().await.subscriptions.clear();
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
