//! The REST fallback against a real HTTP server: snapshot seeding,
//! read receipts, unread counts, and credential rejection.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use capsule_sync::{
    SessionState, SnapshotDelta, SyncClient, SyncClientOptions, SyncError, TopicEvent,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

/// The socket endpoint is never dialed in these tests; port 9 answers
/// to nobody.
const DEAD_WS_ENDPOINT: &str = "ws://127.0.0.1:9/sync";

#[derive(Clone, Default)]
struct ApiState {
    bare_count: bool,
    reads: Arc<Mutex<Vec<i64>>>,
    read_alls: Arc<Mutex<u32>>,
}

fn check_bearer(headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer rest-token") => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn capsule_contents(
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, StatusCode> {
    check_bearer(&headers)?;
    Ok(Json(json!([
        {"id": 1, "caption": format!("capsule {id}, first")},
        {"id": 2, "caption": "second"},
    ])))
}

async fn notifications(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    check_bearer(&headers)?;
    Ok(Json(json!([{"id": 10, "message": "hello"}])))
}

async fn unread_count(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    check_bearer(&headers)?;
    if state.bare_count {
        Ok(Json(json!(4)))
    } else {
        Ok(Json(json!({"count": 4})))
    }
}

async fn mark_read(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    check_bearer(&headers)?;
    state.reads.lock().unwrap().push(id);
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    check_bearer(&headers)?;
    *state.read_alls.lock().unwrap() += 1;
    Ok(StatusCode::NO_CONTENT)
}

async fn serve_api(state: ApiState) -> String {
    let app = Router::new()
        .route("/capsule-content/{id}", get(capsule_contents))
        .route("/notifications", get(notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/read-all", post(mark_all_read))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn offline_client(api_base: String, credential: &str) -> SyncClient {
    SyncClient::new(
        DEAD_WS_ENDPOINT,
        SyncClientOptions {
            credential: credential.into(),
            api_base: Some(api_base),
            ..Default::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn rest_resync_seeds_the_same_reducer_as_the_socket() {
    let base = serve_api(ApiState::default()).await;
    let client = offline_client(base, "rest-token");
    let session = client.capsule_session(42).await;
    let mut updates = session.subscribe(&session.channel().primary_topic()).await;

    let items = session.resync_via_rest().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[0].fields["caption"], json!("capsule 42, first"));

    // Subscribers see the seed exactly like an initial frame.
    let event = timeout(STEP, updates.events.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event,
        TopicEvent::Snapshot(SnapshotDelta::Replaced { count: 2 })
    ));
    assert_eq!(session.snapshot().await.len(), 2);

    // None of this touched the transport.
    assert_eq!(session.state().await, SessionState::Disconnected);
}

#[tokio::test]
async fn notification_feed_falls_back_to_rest_while_offline() {
    let state = ApiState::default();
    let base = serve_api(state.clone()).await;
    let client = offline_client(base, "rest-token");
    let session = client.notification_session("alice").await;

    assert_eq!(session.unread_count().await.unwrap(), 4);

    session.mark_read(10).await.unwrap();
    session.mark_all_read().await.unwrap();
    assert_eq!(*state.reads.lock().unwrap(), vec![10]);
    assert_eq!(*state.read_alls.lock().unwrap(), 1);

    let notes = session.resync_via_rest().await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, 10);
    assert_eq!(notes[0].fields["message"], json!("hello"));
}

#[tokio::test]
async fn bare_number_unread_counts_are_accepted() {
    let base = serve_api(ApiState {
        bare_count: true,
        ..Default::default()
    })
    .await;
    let client = offline_client(base, "rest-token");
    let session = client.notification_session("alice").await;

    assert_eq!(session.unread_count().await.unwrap(), 4);
}

#[tokio::test]
async fn the_shared_api_handle_is_usable_without_a_session() {
    let state = ApiState::default();
    let base = serve_api(state.clone()).await;
    let client = offline_client(base.clone(), "rest-token");

    let api = client.api();
    assert_eq!(api.base_url(), base);

    let items: Vec<capsule_sync::ContentItem> = api.fetch_capsule_contents(42).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(api.fetch_unread_count().await.unwrap(), 4);
    api.mark_read(7).await.unwrap();
    assert_eq!(*state.reads.lock().unwrap(), vec![7]);

    // Going through the handle directly does not seed any snapshot.
    assert!(client.capsule_snapshot(42).await.is_empty());
}

#[tokio::test]
async fn rejected_rest_credentials_surface_as_auth_errors() {
    let base = serve_api(ApiState::default()).await;
    let client = offline_client(base, "stale-token");
    let session = client.capsule_session(42).await;

    let err = session.resync_via_rest().await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert!(!err.is_retryable());
    assert!(session.snapshot().await.is_empty());
}
