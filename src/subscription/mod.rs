pub mod registry;

pub use registry::{SubscriptionId, SubscriptionRegistry, TopicSubscription};
