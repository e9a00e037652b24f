//! HTTP handlers. Identity arrives pre-resolved in the `x-user-id` header;
//! this layer never authenticates, it only hands the resolved id to the
//! service.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::AppState;
use crate::error::{ChatError, Result};
use crate::models::{ConversationSummary, Message, RoomCreated, RoomJoined, RoomSummary, User};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

fn require_user(headers: &HeaderMap) -> Result<String> {
    header(headers, "x-user-id")
        .ok_or_else(|| ChatError::Unauthorized("missing x-user-id".into()))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// GET /me
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let user_id = header(&headers, "x-user-id");
    let name = header(&headers, "x-user-name");
    let user = state.service.get_me(user_id.as_deref(), name.as_deref()).await?;
    Ok(Json(user))
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.service.list_users().await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDmRequest {
    #[serde(default)]
    pub other_user_id: Option<String>,
}

/// POST /dm
pub async fn create_dm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateDmRequest>,
) -> Result<Json<ConversationSummary>> {
    let user_id = require_user(&headers)?;
    info!("POST /dm from {}", user_id);
    let other = body.other_user_id.unwrap_or_default();
    Ok(Json(state.service.create_dm(&user_id, &other).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /rooms
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<RoomCreated>> {
    let user_id = require_user(&headers)?;
    info!("POST /rooms from {}", user_id);
    let name = body.name.unwrap_or_default();
    Ok(Json(state.service.create_room(&user_id, &name).await?))
}

/// POST /rooms/{room_id}/join
pub async fn join_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RoomJoined>> {
    let user_id = require_user(&headers)?;
    Ok(Json(state.service.join_room(&user_id, &room_id).await?))
}

/// GET /rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomSummary>>> {
    let user_id = require_user(&headers)?;
    Ok(Json(state.service.list_rooms(&user_id).await?))
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>> {
    let user_id = require_user(&headers)?;
    Ok(Json(state.service.list_conversations(&user_id).await?))
}

/// GET /conversations/{convo_id}/messages
pub async fn list_messages(
    Path(convo_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>> {
    let user_id = require_user(&headers)?;
    Ok(Json(state.service.list_messages(&user_id, &convo_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// POST /conversations/{convo_id}/messages
pub async fn send_message(
    Path(convo_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>> {
    let user_id = require_user(&headers)?;
    let text = body.text.unwrap_or_default();
    Ok(Json(
        state.service.send_message(&user_id, &convo_id, &text).await?,
    ))
}
