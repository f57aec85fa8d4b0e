use crate::messaging::event::ClientFrame;
use crate::types::error::{Result, SyncError};
use crate::websocket::WsStream;
use futures::SinkExt;
use futures::stream::SplitSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

/// Where a session currently stands. Exactly one session owns the
/// value; every transition goes through the session so they stay
/// serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never opened, or torn down without a failure.
    Disconnected,
    /// Transport dial and handshake in flight.
    Connecting,
    /// Handshake accepted with our credential; topics not yet restored.
    Authenticated,
    /// Connect announcement sent and every active topic re-established.
    Subscribed,
    /// Transport lost; reconnection may be in progress.
    Failed,
    /// Consumer closed the session. Terminal until reopened explicitly.
    Closed,
}

impl SessionState {
    /// States in which frames can be written.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Subscribed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Subscribed => "subscribed",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Holds the write half of the socket and the session state value.
pub struct ConnectionManager {
    ws_write: Arc<RwLock<Option<SplitSink<WsStream, Message>>>>,
    state: Arc<RwLock<SessionState>>,
    write_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            ws_write: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            write_timeout,
        }
    }

    /// Installs the write sink after a successful handshake.
    pub async fn set_writer(&self, writer: SplitSink<WsStream, Message>) {
        let mut ws = self.ws_write.write().await;
        *ws = Some(writer);
    }

    /// Drops the write sink without a close handshake, for when the
    /// transport already died.
    pub async fn clear_writer(&self) {
        let mut ws = self.ws_write.write().await;
        *ws = None;
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().await;
        *state = new_state;
    }

    pub async fn is_live(&self) -> bool {
        self.state.read().await.is_live()
    }

    /// Serializes and sends one frame, bounded by the write timeout.
    pub async fn send_frame(&self, frame: &ClientFrame) -> Result<()> {
        let json = serde_json::to_string(frame)?;
        let mut ws_guard = self.ws_write.write().await;
        let Some(ws) = ws_guard.as_mut() else {
            return Err(SyncError::NotConnected);
        };

        match tokio::time::timeout(self.write_timeout, ws.send(Message::Text(json.into()))).await {
            Err(_) => Err(SyncError::Timeout(self.write_timeout)),
            Ok(sent) => {
                sent?;
                Ok(())
            }
        }
    }

    /// Closes the socket if one is open. Safe to call repeatedly; the
    /// writer is gone afterwards no matter what the close handshake did.
    pub async fn close_socket(&self) -> Result<()> {
        let mut ws_guard = self.ws_write.write().await;
        if let Some(ws) = ws_guard.as_mut() {
            let closed = ws.close().await;
            *ws_guard = None;
            closed?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_writer_is_not_connected() {
        let connection = ConnectionManager::new(Duration::from_secs(1));
        let err = connection
            .send_frame(&ClientFrame::subscribe("/topic/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));
    }

    #[tokio::test]
    async fn close_is_idempotent_without_a_socket() {
        let connection = ConnectionManager::new(Duration::from_secs(1));
        connection.close_socket().await.unwrap();
        connection.close_socket().await.unwrap();
        assert_eq!(connection.state().await, SessionState::Disconnected);
    }

    #[test]
    fn live_states() {
        assert!(SessionState::Authenticated.is_live());
        assert!(SessionState::Subscribed.is_live());
        assert!(!SessionState::Failed.is_live());
        assert!(!SessionState::Closed.is_live());
    }
}
