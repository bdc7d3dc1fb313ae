use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AuthSession;
use crate::api::state::AppState;
use crate::db::{ConversationRepository, ConversationSummary, DEFAULT_TITLE};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub ok: bool,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub ok: bool,
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

/// GET /api/conversations (requires auth)
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = ConversationRepository::list_for_owner(&state.db, &auth.user.id).await?;
    Ok(Json(ConversationListResponse {
        ok: true,
        conversations,
    }))
}

/// POST /api/conversations (requires auth)
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation =
        ConversationRepository::create(&state.db, &auth.user.id, &auth.session_key, "").await?;

    Ok(Json(ConversationResponse {
        ok: true,
        id: conversation.id,
        title: DEFAULT_TITLE.to_string(),
    }))
}

/// POST /api/conversations/rename (requires auth)
pub async fn rename(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation =
        ConversationRepository::rename(&state.db, &auth.user.id, &req.id, &req.title).await?;

    Ok(Json(ConversationResponse {
        ok: true,
        id: conversation.id,
        title: conversation.title,
    }))
}

/// POST /api/conversations/delete (requires auth)
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, AppError> {
    ConversationRepository::delete(&state.db, &auth.user.id, &req.id).await?;
    tracing::info!(conversation_id = %req.id, "Conversation deleted");
    Ok(Json(DeleteResponse { ok: true }))
}
