use crate::client::SyncClient;
use crate::infrastructure::http::{SnapshotApi, http_to_ws_endpoint, ws_to_http_endpoint};
use crate::reconciler::StateReconciler;
use crate::session::core::SessionConfig;
use crate::session::reconnect::RetrySchedule;
use crate::types::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_WRITE_TIMEOUT_MS,
};
use crate::types::error::{Result, SyncError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// A bearer token. Wrapped so debug output never leaks it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn bearer(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SyncClientOptions {
    /// Bearer credential sent on every connection attempt. Required;
    /// connections are never attempted anonymously.
    pub credential: Credential,
    /// Consecutive reconnect attempts allowed per outage.
    pub max_reconnect_attempts: u32,
    /// Delay policy between reconnect attempts.
    pub retry_schedule: RetrySchedule,
    pub connect_timeout: Duration,
    /// A session with no inbound frame for this long treats the
    /// transport as dead.
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Overrides the REST base, which is otherwise derived from the
    /// WebSocket endpoint by swapping the scheme.
    pub api_base: Option<String>,
}

impl Default for SyncClientOptions {
    fn default() -> Self {
        Self {
            credential: Credential::default(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            retry_schedule: RetrySchedule::default(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            api_base: None,
        }
    }
}

/// Validates configuration and assembles a [`SyncClient`].
pub struct SyncClientBuilder {
    endpoint: String,
    options: SyncClientOptions,
}

impl SyncClientBuilder {
    /// Checks the endpoint and credential up front. HTTP(S) endpoints
    /// are accepted and converted to their WebSocket form.
    pub fn new(endpoint: impl Into<String>, options: SyncClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();
        let parsed = Url::parse(&endpoint)?;
        let endpoint = match parsed.scheme() {
            "ws" | "wss" => endpoint,
            "http" | "https" => http_to_ws_endpoint(&endpoint),
            other => {
                return Err(SyncError::Config(format!(
                    "unsupported endpoint scheme '{other}'"
                )));
            }
        };

        if options.credential.is_empty() {
            return Err(SyncError::Auth("credential is required".to_string()));
        }

        Ok(Self { endpoint, options })
    }

    /// Builds the client. The HTTP client is constructed exactly once
    /// here and shared by every session's REST fallback.
    pub fn build(self) -> Result<SyncClient> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.options.connect_timeout)
            .timeout(self.options.read_timeout)
            .build()?;

        let rest_base = self
            .options
            .api_base
            .clone()
            .unwrap_or_else(|| ws_to_http_endpoint(&self.endpoint));
        let api = Arc::new(SnapshotApi::new(
            http,
            rest_base,
            self.options.credential.bearer(),
        ));

        let config = Arc::new(SessionConfig {
            endpoint: self.endpoint,
            credential: self.options.credential,
            connect_timeout: self.options.connect_timeout,
            read_timeout: self.options.read_timeout,
            write_timeout: self.options.write_timeout,
            max_reconnect_attempts: self.options.max_reconnect_attempts,
            retry_schedule: self.options.retry_schedule,
        });

        Ok(SyncClient {
            config,
            api,
            contents: Arc::new(StateReconciler::new()),
            notifications: Arc::new(StateReconciler::new()),
            capsule_sessions: Arc::new(RwLock::new(HashMap::new())),
            notification_sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}
