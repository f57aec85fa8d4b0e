use crate::client::Credential;
use crate::infrastructure::SnapshotApi;
use crate::messaging::event::{ClientFrame, SessionNotice, TopicEvent};
use crate::messaging::router::MessageRouter;
use crate::reconciler::StateReconciler;
use crate::session::connection::{ConnectionManager, SessionState};
use crate::session::reconnect::{ReconnectPolicy, RetrySchedule};
use crate::session::state::SessionShared;
use crate::subscription::{SubscriptionId, SubscriptionRegistry, TopicSubscription};
use crate::types::channel::Channel;
use crate::types::constants::{EVENT_STREAM_CAPACITY, destinations};
use crate::types::entity::{ContentItem, Entity, EntityId, Notification};
use crate::types::error::{Result, SyncError};
use crate::websocket::{self, WsStream};
use futures::StreamExt;
use futures::stream::SplitStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};
use tokio_tungstenite::tungstenite::Message;

/// Everything a session needs to dial and keep dialing, shared by all
/// sessions of one client.
pub(crate) struct SessionConfig {
    pub(crate) endpoint: String,
    pub(crate) credential: Credential,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) retry_schedule: RetrySchedule,
}

/// One authenticated connection to one channel, with everything that
/// hangs off it: the topic registry, the entity snapshot reducer, and
/// the reconnect machinery.
///
/// Sessions are created through [`SyncClient`](crate::client::SyncClient)
/// and handed out as `Arc`s; cloning the `Arc` shares the session.
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
///         credential: "jwt-token".into(),
///         ..Default::default()
///     },
/// )?;
///
/// let session = client.capsule_session(42).await;
/// session.open().await?;
///
/// let mut room = session.subscribe(&session.channel().primary_topic()).await;
/// while let Ok(event) = room.events.recv().await {
///     println!("room changed: {event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChannelSession<T> {
    channel: Channel,
    config: Arc<SessionConfig>,
    connection: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    reconciler: Arc<StateReconciler<T>>,
    router: Arc<MessageRouter<T>>,
    api: Arc<SnapshotApi>,
    shared: Arc<RwLock<SessionShared>>,
    notices_tx: broadcast::Sender<SessionNotice>,
    weak_self: Weak<Self>,
}

impl<T: Entity + DeserializeOwned> ChannelSession<T> {
    /// Builds the session and its reconnect watcher. The channel's own
    /// topics are registered up front so the first connect establishes
    /// them without the consumer doing anything.
    pub(crate) async fn create(
        channel: Channel,
        config: Arc<SessionConfig>,
        reconciler: Arc<StateReconciler<T>>,
        api: Arc<SnapshotApi>,
    ) -> Arc<Self> {
        let registry = Arc::new(SubscriptionRegistry::new());
        for topic in channel.default_topics() {
            registry.register(&topic).await;
        }

        let (notices_tx, _) = broadcast::channel(EVENT_STREAM_CAPACITY);
        let (state_tx, state_rx) = watch::channel((SessionState::Disconnected, false));
        let policy =
            ReconnectPolicy::new(config.max_reconnect_attempts, config.retry_schedule.clone());
        let router = Arc::new(MessageRouter::new(
            channel.clone(),
            Arc::clone(&reconciler),
            Arc::clone(&registry),
            notices_tx.clone(),
        ));
        let connection = Arc::new(ConnectionManager::new(config.write_timeout));
        let shared = Arc::new(RwLock::new(SessionShared::new(state_tx, policy)));

        let session = Arc::new_cyclic(|weak| Self {
            channel,
            config,
            connection,
            registry,
            reconciler,
            router,
            api,
            shared,
            notices_tx,
            weak_self: weak.clone(),
        });
        Self::spawn_reconnect_watcher(&session, state_rx);
        session
    }

    /// Opens the session: dials with the bearer credential, announces
    /// the client on the channel, and re-establishes every registered
    /// topic. Safe to call while already open or opening.
    ///
    /// On a transport failure the error is returned *and* the session
    /// enters `Failed`, so reconnection keeps running in the
    /// background. A credential rejection is final until the consumer
    /// calls `open` again.
    pub async fn open(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if matches!(
                state,
                SessionState::Connecting | SessionState::Authenticated | SessionState::Subscribed
            ) {
                return Ok(());
            }
        }

        // A manual open starts a fresh attempt budget.
        {
            let mut shared = self.shared.write().await;
            shared.suppress_reconnect = false;
            shared.policy.reset();
        }

        // close() drops the channel's own topics along with everything
        // else; a reopened session wants them back.
        for topic in self.channel.default_topics() {
            self.registry.register(&topic).await;
        }
        self.establish().await
    }

    /// Closes the transport, stops every background task, and drops all
    /// subscriptions and the channel's snapshot. Idempotent; automatic
    /// reconnection stays off until the next `open`.
    pub async fn close(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if state == SessionState::Closed {
                return Ok(());
            }
        }
        tracing::info!(channel = %self.channel, "closing session");

        // Suppression and the task handover happen under one lock so a
        // concurrent reconnect cannot slip a task in between.
        let task_manager = {
            let mut shared = self.shared.write().await;
            shared.suppress_reconnect = true;
            std::mem::take(&mut shared.task_manager)
        };
        task_manager.shutdown().await;

        let closed = self.connection.close_socket().await;
        self.set_state(SessionState::Closed).await;
        self.registry.clear().await;
        self.reconciler.clear(&self.channel).await;
        closed
    }

    /// Registers interest in a topic and returns its event stream.
    ///
    /// While the session is live the subscribe frame goes out
    /// immediately; otherwise it is queued and sent on the next
    /// successful authentication. A frame that fails to send is
    /// reported on the notice stream and retried on reconnect, so the
    /// returned handle stays valid either way.
    pub async fn subscribe(&self, topic: &str) -> TopicSubscription {
        let (subscription, needs_frame) = self.registry.register(topic).await;
        if !needs_frame {
            return subscription;
        }

        if self.connection.is_live().await {
            if let Err(err) = self.send_or_fail(&ClientFrame::subscribe(topic)).await {
                tracing::warn!(channel = %self.channel, topic, %err, "subscribe frame failed");
                let _ = self.notices_tx.send(SessionNotice::SubscriptionFailed {
                    topic: topic.to_string(),
                    error: err.to_string(),
                });
            }
        } else {
            tracing::debug!(channel = %self.channel, topic, "subscription queued until live");
        }
        subscription
    }

    /// Deactivates a subscription and tells the server when connected.
    /// Unknown or already-inactive ids are a no-op.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let Some(topic) = self.registry.deactivate(id).await else {
            return Ok(());
        };
        tracing::debug!(channel = %self.channel, topic, "subscription deactivated");
        if self.connection.is_live().await {
            self.send_or_fail(&ClientFrame::unsubscribe(&topic)).await?;
        }
        Ok(())
    }

    /// Current entities on this channel, sorted by id.
    pub async fn snapshot(&self) -> Vec<T> {
        self.reconciler.current_snapshot(&self.channel).await
    }

    /// One entity by id, when present in the snapshot.
    pub async fn entity(&self, id: EntityId) -> Option<T> {
        self.reconciler.entity(&self.channel, id).await
    }

    /// Fetches the channel's snapshot over REST and runs it through the
    /// same reducer an `initial` frame would take. Returns the entities
    /// now in place. For when the live channel cannot be established.
    pub async fn resync_via_rest(&self) -> Result<Vec<T>> {
        let items: Vec<T> = self.api.fetch_snapshot(&self.channel).await?;
        let delta = self.reconciler.seed_initial(&self.channel, items).await;
        self.registry
            .dispatch(&self.channel.primary_topic(), TopicEvent::Snapshot(delta))
            .await;
        Ok(self.snapshot().await)
    }

    pub async fn state(&self) -> SessionState {
        self.connection.state().await
    }

    /// A watch on `(state, reconnect_suppressed)` pairs. The flag is
    /// true after a manual close or a credential rejection, when no
    /// automatic reconnect will follow.
    pub async fn state_changes(&self) -> watch::Receiver<(SessionState, bool)> {
        self.shared.read().await.state_tx.subscribe()
    }

    /// Out-of-band notices: lost connections, exhausted reconnect
    /// budgets, rejected credentials, unread counts with no subscriber.
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices_tx.subscribe()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Frames dropped so far for carrying an unrecognized kind.
    pub fn unknown_frame_count(&self) -> u64 {
        self.router.unknown_frame_count()
    }

    async fn set_state(&self, state: SessionState) {
        self.connection.set_state(state).await;
        let shared = self.shared.read().await;
        shared.notify_state(state);
    }

    /// One full connection attempt. On failure the session lands in
    /// `Failed` (unless a close already won) and the error propagates.
    async fn establish(&self) -> Result<()> {
        self.set_state(SessionState::Connecting).await;

        match self.dial_and_prepare().await {
            Ok(()) => Ok(()),
            Err(err) => {
                {
                    let mut shared = self.shared.write().await;
                    if matches!(err, SyncError::Auth(_)) {
                        shared.suppress_reconnect = true;
                    }
                    shared.task_manager.abort_all();
                }
                if let SyncError::Auth(reason) = &err {
                    tracing::error!(channel = %self.channel, %reason, "credential rejected");
                    let _ = self.notices_tx.send(SessionNotice::AuthRejected {
                        error: reason.clone(),
                    });
                }
                self.connection.clear_writer().await;
                if self.connection.state().await != SessionState::Closed {
                    self.set_state(SessionState::Failed).await;
                }
                Err(err)
            }
        }
    }

    async fn dial_and_prepare(&self) -> Result<()> {
        // Drop leftovers of the previous transport before dialing again.
        {
            let mut shared = self.shared.write().await;
            shared.task_manager.abort_all();
        }
        self.connection.clear_writer().await;

        let stream = websocket::connect(
            &self.config.endpoint,
            self.config.credential.bearer(),
            self.config.connect_timeout,
        )
        .await?;

        // A close() racing the dial wins.
        if self.shared.read().await.suppress_reconnect {
            return Err(SyncError::Closed);
        }

        let (write_half, read_half) = stream.split();
        self.connection.set_writer(write_half).await;
        self.set_state(SessionState::Authenticated).await;
        {
            let mut shared = self.shared.write().await;
            shared.policy.reset();
        }
        self.spawn_read_task(read_half).await;

        self.connection
            .send_frame(&ClientFrame::connect(&self.channel))
            .await?;
        self.resubscribe_all().await;

        // Checked once more because a close() may have raced the whole
        // dial; the close wins and the fresh transport goes down again.
        if self.shared.read().await.suppress_reconnect {
            {
                let mut shared = self.shared.write().await;
                shared.task_manager.abort_all();
            }
            let _ = self.connection.close_socket().await;
            if self.connection.state().await != SessionState::Closed {
                self.set_state(SessionState::Closed).await;
            }
            return Err(SyncError::Closed);
        }

        self.set_state(SessionState::Subscribed).await;
        tracing::info!(channel = %self.channel, "session subscribed");
        Ok(())
    }

    /// Re-sends subscribe frames for every still-active topic in
    /// registration order. One topic failing does not stop the rest;
    /// each failure is reported on its own.
    async fn resubscribe_all(&self) {
        let topics = self.registry.active_topics().await;
        if topics.is_empty() {
            return;
        }
        tracing::debug!(channel = %self.channel, count = topics.len(), "re-establishing topics");
        for topic in topics {
            if let Err(err) = self
                .connection
                .send_frame(&ClientFrame::subscribe(&topic))
                .await
            {
                tracing::warn!(channel = %self.channel, topic, %err, "topic re-subscribe failed");
                let _ = self.notices_tx.send(SessionNotice::SubscriptionFailed {
                    topic,
                    error: err.to_string(),
                });
            }
        }
    }

    async fn spawn_read_task(&self, read_half: SplitStream<WsStream>) {
        let Some(session) = self.weak_self.upgrade() else {
            return;
        };
        let read_timeout = self.config.read_timeout;
        let mut shared = self.shared.write().await;
        shared.task_manager.spawn("read", async move {
            run_read_loop(session, read_half, read_timeout).await;
        });
    }

    /// Marks the transport dead and hands control to the reconnect
    /// watcher, unless the consumer already closed the session.
    async fn note_transport_failure(&self, reason: Option<String>) {
        self.connection.clear_writer().await;
        if self.connection.state().await == SessionState::Closed {
            return;
        }
        self.set_state(SessionState::Failed).await;
        let _ = self
            .notices_tx
            .send(SessionNotice::ConnectionLost { reason });
    }

    /// Sends one consumer-initiated frame. A write timeout or transport
    /// error counts as a transport failure for the whole session, so
    /// the reconnect watcher takes over while the error propagates.
    async fn send_or_fail(&self, frame: &ClientFrame) -> Result<()> {
        match self.connection.send_frame(frame).await {
            Err(err) if matches!(err, SyncError::Timeout(_) | SyncError::Transport(_)) => {
                self.note_transport_failure(Some(err.to_string())).await;
                Err(err)
            }
            other => other,
        }
    }

    fn spawn_reconnect_watcher(
        session: &Arc<Self>,
        mut state_rx: watch::Receiver<(SessionState, bool)>,
    ) {
        let weak = Arc::downgrade(session);
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let (state, suppressed) = *state_rx.borrow_and_update();
                if state != SessionState::Failed || suppressed {
                    continue;
                }
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.run_reconnect_loop().await;
            }
            tracing::debug!("reconnect watcher finished");
        });
    }

    /// Retries until connected, the attempt budget runs out, or the
    /// session is closed. The budget was reset by the last successful
    /// authentication, so it counts attempts within this outage only.
    async fn run_reconnect_loop(&self) {
        loop {
            if self.connection.state().await != SessionState::Failed {
                return;
            }

            let (delay, attempt) = {
                let mut shared = self.shared.write().await;
                if shared.suppress_reconnect {
                    return;
                }
                match shared.policy.next_delay() {
                    Some(delay) => (delay, shared.policy.attempts()),
                    None => {
                        let attempts = shared.policy.attempts();
                        let announce = shared.policy.report_exhaustion();
                        drop(shared);
                        if announce {
                            tracing::error!(
                                channel = %self.channel,
                                attempts,
                                "reconnect attempts exhausted"
                            );
                            let _ = self
                                .notices_tx
                                .send(SessionNotice::ReconnectExhausted { attempts });
                        }
                        return;
                    }
                }
            };

            tracing::info!(channel = %self.channel, attempt, ?delay, "reconnect scheduled");
            tokio::time::sleep(delay).await;

            // The world may have moved on during the sleep.
            if self.shared.read().await.suppress_reconnect {
                return;
            }
            if self.connection.state().await != SessionState::Failed {
                return;
            }

            match self.establish().await {
                Ok(()) => {
                    tracing::info!(channel = %self.channel, "reconnected");
                    return;
                }
                // A close() that won the race mid-dial is not an error.
                Err(SyncError::Closed) => return,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(channel = %self.channel, %err, "reconnect attempt failed");
                }
                Err(err) => {
                    tracing::error!(channel = %self.channel, %err, "reconnect stopped by fatal error");
                    return;
                }
            }
        }
    }

    fn require_capsule(&self, operation: &'static str) -> Result<i64> {
        self.channel
            .capsule_id()
            .ok_or(SyncError::ChannelMismatch(operation))
    }
}

/// Capsule-room operations.
impl ChannelSession<ContentItem> {
    /// Sends a create-or-update for one content item. The server
    /// rebroadcasts the result, which is what lands in the snapshot;
    /// the fresh event id lets it discard duplicate submissions.
    pub async fn upload_content(&self, content: &impl Serialize) -> Result<()> {
        let capsule_id = self.require_capsule("upload_content")?;
        let value = serde_json::to_value(content)?;
        self.send_or_fail(&ClientFrame::content_update(capsule_id, value))
            .await
    }

    /// Asks the room to remove one content item by id.
    pub async fn delete_content(&self, content_id: EntityId) -> Result<()> {
        let capsule_id = self.require_capsule("delete_content")?;
        self.send_or_fail(&ClientFrame::content_delete(capsule_id, content_id))
            .await
    }
}

/// Notification-feed operations.
impl ChannelSession<Notification> {
    /// Marks one notification read, over the socket when live and over
    /// REST otherwise.
    pub async fn mark_read(&self, notification_id: EntityId) -> Result<()> {
        if self.connection.is_live().await {
            let frame = ClientFrame::MarkRead {
                topic: destinations::NOTIFICATIONS_MARK_READ.to_string(),
                notification_id,
            };
            return self.send_or_fail(&frame).await;
        }
        self.api.mark_read(notification_id).await
    }

    /// Marks the whole feed read, over the socket when live and over
    /// REST otherwise.
    pub async fn mark_all_read(&self) -> Result<()> {
        if self.connection.is_live().await {
            let frame = ClientFrame::MarkAllRead {
                topic: destinations::NOTIFICATIONS_MARK_ALL_READ.to_string(),
            };
            return self.send_or_fail(&frame).await;
        }
        self.api.mark_all_read().await
    }

    /// Current unread count from the REST side, independent of the
    /// count topic.
    pub async fn unread_count(&self) -> Result<u64> {
        self.api.fetch_unread_count().await
    }
}

async fn run_read_loop<T: Entity + DeserializeOwned>(
    session: Arc<ChannelSession<T>>,
    mut read_half: SplitStream<WsStream>,
    read_timeout: Duration,
) {
    tracing::debug!(channel = %session.channel, "read task started");
    loop {
        match tokio::time::timeout(read_timeout, read_half.next()).await {
            Err(_) => {
                tracing::warn!(channel = %session.channel, ?read_timeout, "read timed out");
                session
                    .note_transport_failure(Some(format!("no frame within {read_timeout:?}")))
                    .await;
                break;
            }
            Ok(None) => {
                tracing::warn!(channel = %session.channel, "server stream ended");
                session
                    .note_transport_failure(Some("stream ended".to_string()))
                    .await;
                break;
            }
            Ok(Some(Err(err))) => {
                tracing::error!(channel = %session.channel, %err, "websocket read error");
                session.note_transport_failure(Some(err.to_string())).await;
                break;
            }
            Ok(Some(Ok(message))) => {
                if !handle_message(&session, message).await {
                    break;
                }
            }
        }
    }
    tracing::debug!(channel = %session.channel, "read task finished");
}

/// Returns false when the connection is gone and the loop should end.
async fn handle_message<T: Entity + DeserializeOwned>(
    session: &ChannelSession<T>,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            if let Err(err) = session.router.route(&text).await {
                tracing::warn!(channel = %session.channel, %err, "dropping frame");
            }
            true
        }
        Message::Close(frame) => {
            let reason = frame.map(|f| format!("code={}, reason='{}'", f.code, f.reason));
            tracing::warn!(
                channel = %session.channel,
                reason = reason.as_deref().unwrap_or("none"),
                "server closed the connection"
            );
            session.note_transport_failure(reason).await;
            false
        }
        // tungstenite queues the pong itself; this is observability only.
        Message::Ping(data) => {
            tracing::debug!(bytes = data.len(), "ping");
            true
        }
        Message::Pong(data) => {
            tracing::debug!(bytes = data.len(), "pong");
            true
        }
        Message::Binary(data) => {
            tracing::warn!(bytes = data.len(), "ignoring unexpected binary message");
            true
        }
        Message::Frame(_) => true,
    }
}
