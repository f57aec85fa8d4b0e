use crate::types::channel::Channel;
use crate::types::error::{Result, SyncError};
use serde::de::DeserializeOwned;

/// REST fallback for when the live channel is unavailable, plus the
/// notification read-state calls that do not ride the socket.
///
/// Shares one `reqwest::Client` with everything else the consumer runs;
/// the builder constructs it exactly once and hands it in.
pub struct SnapshotApi {
    http: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl SnapshotApi {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, bearer: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: bearer.into(),
        }
    }

    /// The resolved REST base, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One-shot snapshot fetch for a channel, shaped like the socket's
    /// `initial` payload so it can seed the same reducer.
    pub async fn fetch_snapshot<T: DeserializeOwned>(&self, channel: &Channel) -> Result<Vec<T>> {
        match channel {
            Channel::CapsuleRoom { capsule_id } => self.fetch_capsule_contents(*capsule_id).await,
            Channel::Notifications { .. } => self.fetch_notifications().await,
        }
    }

    pub async fn fetch_capsule_contents<T: DeserializeOwned>(
        &self,
        capsule_id: i64,
    ) -> Result<Vec<T>> {
        let url = format!("{}/capsule-content/{}", self.base_url, capsule_id);
        self.get_json(&url).await
    }

    pub async fn fetch_notifications<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let url = format!("{}/notifications", self.base_url);
        self.get_json(&url).await
    }

    /// Current unread count. The server answers either a bare number or
    /// `{"count": n}`; both are accepted.
    pub async fn fetch_unread_count(&self) -> Result<u64> {
        let url = format!("{}/notifications/unread-count", self.base_url);
        let value: serde_json::Value = self.get_json(&url).await?;
        value
            .as_u64()
            .or_else(|| value.get("count").and_then(|count| count.as_u64()))
            .ok_or_else(|| SyncError::Parse(format!("unexpected unread-count payload: {value}")))
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<()> {
        let url = format!("{}/notifications/{}/read", self.base_url, notification_id);
        self.post_empty(&url).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        let url = format!("{}/notifications/read-all", self.base_url);
        self.post_empty(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        let response = check_auth(response)?;
        Ok(response.error_for_status()?.json().await?)
    }

    async fn post_empty(&self, url: &str) -> Result<()> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        let response = check_auth(response)?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Rejected credentials are fatal, not retryable, so they get their own
/// error before the generic status check.
fn check_auth(response: reqwest::Response) -> Result<reqwest::Response> {
    match response.status() {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Err(SyncError::Auth(
            format!("server rejected credential with status {}", response.status()),
        )),
        _ => Ok(response),
    }
}

/// Derives the REST endpoint from a WebSocket one (scheme swap, query
/// dropped).
pub fn ws_to_http_endpoint(ws_endpoint: &str) -> String {
    ws_endpoint
        .replace("ws://", "http://")
        .replace("wss://", "https://")
        .split('?')
        .next()
        .unwrap_or(ws_endpoint)
        .to_string()
}

/// The inverse derivation, for consumers who configure an HTTP base.
pub fn http_to_ws_endpoint(http_endpoint: &str) -> String {
    http_endpoint
        .replace("http://", "ws://")
        .replace("https://", "wss://")
        .split('?')
        .next()
        .unwrap_or(http_endpoint)
        .to_string()
}
