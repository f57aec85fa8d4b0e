use thiserror::Error;

/// Errors that can occur when using the capsule sync client.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or rejected credential. Fatal: the session never retries
    /// an authentication failure on its own.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// WebSocket transport failure (dial, TLS, read, write). Retried by
    /// the reconnect policy while attempts remain.
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame could not be decoded into a known event shape. Routed
    /// frames that fail to parse are dropped, never fatal.
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON serialization of an outbound frame failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// REST fallback request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed endpoint URL.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Rejected client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation exceeded its configured timeout.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Attempted to send while the session has no open transport.
    #[error("Not connected")]
    NotConnected,

    /// Operation that only exists on the other channel kind.
    #[error("operation '{0}' is not available on this channel")]
    ChannelMismatch(&'static str),

    /// The session was closed by the consumer; no further operations run.
    #[error("Session closed")]
    Closed,
}

/// Convenience type alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Whether the reconnect policy may retry after this error.
    ///
    /// Authentication failures and consumer-initiated closes are terminal;
    /// everything transport-shaped is fair game for another attempt. An
    /// unparseable endpoint will never dial, so it is terminal too.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(tokio_tungstenite::tungstenite::Error::Url(_))
            | SyncError::Transport(tokio_tungstenite::tungstenite::Error::HttpFormat(_)) => false,
            SyncError::Transport(_) | SyncError::Timeout(_) => true,
            _ => false,
        }
    }
}
