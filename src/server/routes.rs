//! HTTP route handlers for the chat log viewer.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::ingest::IngestError;
use crate::session::{ConversationSession, SessionId};
use crate::transcript::Message;

use super::state::AppState;

/// Cookie carrying the caller's session id.
pub const SESSION_COOKIE: &str = "chatlog_session";
/// Multipart field holding the uploaded archive.
const UPLOAD_FIELD: &str = "file";

type HandlerError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route("/api/upload", post(upload_archive))
        .route("/api/conversation", get(get_conversation))
        .route("/api/attachments/{*reference}", get(get_attachment))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.store.stats();
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatlog-viewer",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": stats.sessions,
        "total_bytes": stats.total_bytes,
        "capacity_bytes": stats.capacity_bytes,
    }))
}

/// Conversation payload returned to clients.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    /// Messages in transcript order.
    pub messages: Vec<Message>,
    /// Number of distinct attachments cached.
    pub attachments: usize,
    /// Aggregate attachment size in bytes.
    pub size_bytes: u64,
    /// When the conversation was ingested.
    pub created_at: DateTime<Utc>,
}

impl From<&ConversationSession> for ConversationView {
    fn from(session: &ConversationSession) -> Self {
        Self {
            messages: session.messages().to_vec(),
            attachments: session.attachments().len(),
            size_bytes: session.size_bytes(),
            created_at: session.created_at(),
        }
    }
}

/// Handle archive uploads.
///
/// Ingests the archive, caches it under the caller's session id (issuing one
/// when absent) and runs the memory-pressure cleanup.
async fn upload_archive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, HandlerError> {
    let upload = read_upload(multipart).await?;

    let ingestor = state.ingestor.clone();
    let session = tokio::task::spawn_blocking(move || ingestor.ingest(&upload))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Upload task failed: {e}")))?
        .map_err(ingest_failure)?;

    let session_id = session_cookie(&headers).unwrap_or_else(|| SessionId::new().to_string());
    let view = ConversationView::from(&session);

    state.store.set(session_id.clone(), session);
    state.store.cleanup();
    info!(messages = view.messages.len(), size_bytes = view.size_bytes, "Upload cached");

    let cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        state.config.sessions.ttl_seconds
    );
    Ok(([(header::SET_COOKIE, cookie)], Json(view)).into_response())
}

/// Return the conversation cached for the caller's session.
async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ConversationView>, HandlerError> {
    let session = lookup_session(&state, &headers)?;
    Ok(Json(ConversationView::from(session.as_ref())))
}

/// Serve a cached attachment by reference.
async fn get_attachment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Response, HandlerError> {
    let session = lookup_session(&state, &headers)?;
    let bytes = session
        .attachment(&reference)
        .map(Bytes::copy_from_slice)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown attachment: {reference}")))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&reference))], bytes).into_response())
}

async fn read_upload(mut multipart: Multipart) -> Result<Bytes, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field.bytes().await.map_err(|e| (e.status(), e.body_text()));
        }
    }
    Err((
        StatusCode::BAD_REQUEST,
        format!("Missing multipart field '{UPLOAD_FIELD}'"),
    ))
}

fn lookup_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<ConversationSession>, HandlerError> {
    session_cookie(headers)
        .and_then(|id| state.store.get(&id))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No conversation for this session".to_string()))
}

fn ingest_failure(err: IngestError) -> HandlerError {
    if err.is_client_error() {
        warn!(%err, "Rejected upload");
        (StatusCode::BAD_REQUEST, format!("Invalid archive: {err}"))
    } else {
        tracing::error!(%err, "Upload processing failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Upload failed: {err}"))
    }
}

/// Extract the session id from the `Cookie` header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn content_type_for(reference: &str) -> &'static str {
    let extension = reference
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
