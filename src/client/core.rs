use crate::client::builder::{SyncClientBuilder, SyncClientOptions};
use crate::infrastructure::SnapshotApi;
use crate::reconciler::StateReconciler;
use crate::session::core::{ChannelSession, SessionConfig};
use crate::types::channel::Channel;
use crate::types::entity::{ContentItem, Notification};
use crate::types::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The entry point for real-time capsule sync.
///
/// A `SyncClient` owns one session per logical channel: at most one per
/// capsule room and one per notification feed. Sessions are created
/// lazily, cached, and shared; asking twice for the same channel hands
/// back the same session.
///
/// # Example
///
/// ```no_run
/// use capsule_sync::{SyncClient, SyncClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SyncClient::new(
///     "wss://capsule.example/sync",
///     SyncClientOptions {
///         credential: "jwt-token".to_string().into(),
///         ..Default::default()
///     },
/// )?;
///
/// let feed = client.open_notifications("alice").await?;
/// let mut notices = feed.notices();
/// if let Ok(notice) = notices.recv().await {
///     println!("out of band: {notice:?}");
/// }
///
/// let room = client.open_capsule(42).await?;
/// println!("{} items", room.snapshot().await.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyncClient {
    pub(crate) config: Arc<SessionConfig>,
    pub(crate) api: Arc<SnapshotApi>,
    pub(crate) contents: Arc<StateReconciler<ContentItem>>,
    pub(crate) notifications: Arc<StateReconciler<Notification>>,
    pub(crate) capsule_sessions: Arc<RwLock<HashMap<i64, Arc<ChannelSession<ContentItem>>>>>,
    pub(crate) notification_sessions:
        Arc<RwLock<HashMap<String, Arc<ChannelSession<Notification>>>>>,
}

impl SyncClient {
    /// Creates a client for the given WebSocket endpoint.
    ///
    /// Nothing is dialed yet; sessions connect when opened.
    ///
    /// # Errors
    ///
    /// [`SyncError::UrlParse`](crate::types::SyncError::UrlParse) or
    /// [`SyncError::Config`](crate::types::SyncError::Config) for a bad
    /// endpoint, [`SyncError::Auth`](crate::types::SyncError::Auth)
    /// when no credential was provided.
    pub fn new(endpoint: impl Into<String>, options: SyncClientOptions) -> Result<Self> {
        SyncClientBuilder::new(endpoint, options)?.build()
    }

    /// The session for one capsule's content room, created on first
    /// use. Does not connect; call [`open`](ChannelSession::open) on
    /// the session.
    pub async fn capsule_session(&self, capsule_id: i64) -> Arc<ChannelSession<ContentItem>> {
        {
            let sessions = self.capsule_sessions.read().await;
            if let Some(existing) = sessions.get(&capsule_id) {
                return Arc::clone(existing);
            }
        }

        let session = ChannelSession::create(
            Channel::capsule_room(capsule_id),
            Arc::clone(&self.config),
            Arc::clone(&self.contents),
            Arc::clone(&self.api),
        )
        .await;

        let mut sessions = self.capsule_sessions.write().await;
        Arc::clone(sessions.entry(capsule_id).or_insert(session))
    }

    /// The session for one user's notification feed, created on first
    /// use.
    pub async fn notification_session(&self, username: &str) -> Arc<ChannelSession<Notification>> {
        {
            let sessions = self.notification_sessions.read().await;
            if let Some(existing) = sessions.get(username) {
                return Arc::clone(existing);
            }
        }

        let session = ChannelSession::create(
            Channel::notifications(username),
            Arc::clone(&self.config),
            Arc::clone(&self.notifications),
            Arc::clone(&self.api),
        )
        .await;

        let mut sessions = self.notification_sessions.write().await;
        Arc::clone(sessions.entry(username.to_string()).or_insert(session))
    }

    /// Convenience: get the capsule session and open it.
    pub async fn open_capsule(&self, capsule_id: i64) -> Result<Arc<ChannelSession<ContentItem>>> {
        let session = self.capsule_session(capsule_id).await;
        session.open().await?;
        Ok(session)
    }

    /// Convenience: get the notification session and open it.
    pub async fn open_notifications(
        &self,
        username: &str,
    ) -> Result<Arc<ChannelSession<Notification>>> {
        let session = self.notification_session(username).await;
        session.open().await?;
        Ok(session)
    }

    /// Current contents of one capsule room, sorted by id. Empty when
    /// the room was never opened or seeded.
    pub async fn capsule_snapshot(&self, capsule_id: i64) -> Vec<ContentItem> {
        self.contents
            .current_snapshot(&Channel::capsule_room(capsule_id))
            .await
    }

    /// Current notifications for one user, sorted by id.
    pub async fn notification_snapshot(&self, username: &str) -> Vec<Notification> {
        self.notifications
            .current_snapshot(&Channel::notifications(username))
            .await
    }

    /// Closes every session this client created. Sessions stay cached
    /// and can be reopened.
    pub async fn close_all(&self) -> Result<()> {
        let capsules: Vec<_> = self.capsule_sessions.read().await.values().cloned().collect();
        let feeds: Vec<_> = self
            .notification_sessions
            .read()
            .await
            .values()
            .cloned()
            .collect();

        let mut first_err = None;
        for session in capsules {
            if let Err(err) = session.close().await {
                tracing::warn!(channel = %session.channel(), %err, "close failed");
                first_err.get_or_insert(err);
            }
        }
        for session in feeds {
            if let Err(err) = session.close().await {
                tracing::warn!(channel = %session.channel(), %err, "close failed");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Direct access to the REST fallback shared by the sessions.
    pub fn api(&self) -> &SnapshotApi {
        &self.api
    }
}
