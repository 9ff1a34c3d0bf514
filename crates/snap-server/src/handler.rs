use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use bytes::BytesMut;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use snap_content::MenuData;
use snap_images::{ImageError, ALLOWED_MIME_TYPES};
use snap_notify::Subscription;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "image";

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

pub async fn get_content(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let content = state.content.read().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Content loaded successfully",
        "content": content,
    })))
}

pub async fn save_content(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(content) = payload?;
    state.content.save(content.clone()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Site content saved successfully",
        "content": content,
    })))
}

/// One key of an update path. Array positions may arrive as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Name(String),
    Index(u64),
}

impl From<PathKey> for String {
    fn from(key: PathKey) -> Self {
        match key {
            PathKey::Name(name) => name,
            PathKey::Index(index) => index.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSectionRequest {
    pub section: String,
    #[serde(default)]
    pub path: Vec<PathKey>,
    pub value: Value,
}

pub async fn update_section(
    State(state): State<AppState>,
    payload: Result<Json<UpdateSectionRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    let path: Vec<String> = request.path.into_iter().map(String::from).collect();
    let update = state
        .content
        .update_section(&request.section, &path, request.value)
        .await?;
    Ok(Json(json!({ "success": true, "content": update.content })))
}

pub async fn history(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let history = state.content.history().await?;
    Ok(Json(json!({ "success": true, "history": history })))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path(timestamp): Path<String>,
) -> ServerResult<Json<Value>> {
    let content = state.content.get_version(&timestamp).await?;
    Ok(Json(json!({ "success": true, "content": content })))
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub timestamp: String,
}

pub async fn restore(
    State(state): State<AppState>,
    payload: Result<Json<RestoreRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    let content = state.content.restore(&request.timestamp).await?;
    Ok(Json(json!({ "success": true, "content": content })))
}

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

pub async fn get_menu(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let menu = state.menu.read_all().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Menu data loaded successfully",
        "data": menu,
    })))
}

pub async fn save_menu(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(body) = payload?;
    let menu = MenuData::from_value(&body)?;
    state.menu.write_all(&menu).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Menu data saved successfully",
        "data": menu,
    })))
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Accept a single `image` field. Type and size are checked while the body
/// streams in, before anything is written.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<Value>> {
    let mut multipart = multipart?;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let mime = field.content_type().unwrap_or_default().to_string();
        let name = field.file_name().unwrap_or_default().to_string();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(ImageError::UnsupportedType(mime).into());
        }

        let max = state.images.max_upload_bytes();
        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            data.extend_from_slice(&chunk);
            let size = data.len() as u64;
            if size > max {
                return Err(ImageError::TooLarge { size, max }.into());
            }
        }

        let uploaded = state.images.upload(data.freeze(), &mime, &name).await?;
        return Ok(Json(json!({
            "success": true,
            "url": uploaded.url,
            "filename": uploaded.filename,
        })));
    }
    Err(ServerError::BadRequest("No file uploaded".into()))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub url: Option<String>,
}

pub async fn verify_image(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> ServerResult<Json<Value>> {
    let Query(query) = query?;
    let url = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ServerError::BadRequest("URL parameter is required".into()))?;
    if state.images.exists(&url).await {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ServerError::NotFound("Image not found or invalid".into()))
    }
}

pub async fn list_images(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "images": state.images.list_tracked() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub used_images: Vec<String>,
}

pub async fn cleanup_images(
    State(state): State<AppState>,
    payload: Result<Json<CleanupRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = payload?;
    let used = request.used_images.into_iter().collect();
    let report = state.images.reconcile_and_prune(&used).await?;
    Ok(Json(json!({
        "success": true,
        "scanned": report.scanned,
        "deleted": report.deleted,
        "failed": report.failed,
    })))
}

// ---------------------------------------------------------------------------
// Live updates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Upgrade to a WebSocket that receives every content change. The token is
/// checked before the upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    upgrade: Option<WebSocketUpgrade>,
) -> ServerResult<Response> {
    state.notifier.admit(query.token.as_deref())?;
    let upgrade = upgrade
        .ok_or_else(|| ServerError::BadRequest("expected a WebSocket upgrade".into()))?;
    let subscription = state.notifier.subscribe();
    Ok(upgrade
        .on_upgrade(move |socket| forward_events(socket, subscription))
        .into_response())
}

async fn forward_events(mut socket: WebSocket, mut subscription: Subscription) {
    let id = subscription.id();
    loop {
        tokio::select! {
            event = subscription.next() => {
                let Ok(event) = event else { break };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(subscriber = id, error = %e, "failed to encode content event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(subscriber = id, error = %e, "websocket error");
                    break;
                }
                Some(Ok(_)) => debug!(subscriber = id, "ignoring client message"),
            },
        }
    }
    info!(subscriber = id, "client disconnected from content updates");
}
