use crate::types::error::{Result, SyncError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the endpoint with the bearer credential attached. Connections
/// are never attempted anonymously; callers validate the credential
/// before getting here.
pub async fn connect(endpoint: &str, bearer: &str, connect_timeout: Duration) -> Result<WsStream> {
    let mut request = endpoint.into_client_request()?;
    let header = HeaderValue::from_str(&format!("Bearer {bearer}"))
        .map_err(|err| SyncError::Auth(format!("credential not usable as a header: {err}")))?;
    request.headers_mut().insert(AUTHORIZATION, header);

    tracing::debug!(endpoint, "dialing websocket");
    match tokio::time::timeout(connect_timeout, connect_async(request)).await {
        Err(_) => Err(SyncError::Timeout(connect_timeout)),
        Ok(Err(err)) => Err(map_handshake_error(err)),
        Ok(Ok((stream, response))) => {
            tracing::debug!(status = %response.status(), "websocket handshake accepted");
            Ok(stream)
        }
    }
}

/// A rejected handshake with 401/403 means the credential is bad, which
/// is fatal; everything else stays a transport error and is retryable.
fn map_handshake_error(err: tokio_tungstenite::tungstenite::Error) -> SyncError {
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response)
            if response.status() == 401 || response.status() == 403 =>
        {
            SyncError::Auth(format!(
                "handshake rejected with status {}",
                response.status()
            ))
        }
        other => SyncError::Transport(other),
    }
}
