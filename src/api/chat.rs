use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AuthSession;
use crate::api::state::AppState;
use crate::db::{Message, MessageRole, DEFAULT_TITLE};
use crate::error::AppError;
use crate::storage::StorageKeyCodec;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageItem {
    pub id: i64,
    pub role: MessageRole,
    pub content: String,
    /// Presigned, empty when the message has no file.
    pub file_url: String,
    pub created_at: i64,
}

impl MessageItem {
    fn from_message(message: Message, codec: &StorageKeyCodec) -> Self {
        Self {
            file_url: codec.presign_for_display(&message.file_url),
            id: message.id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub conversation_id: String,
    pub title: String,
    pub document_url: String,
    pub messages: Vec<MessageItem>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub conversation_id: String,
    pub message: MessageItem,
    pub attachment_delivered: bool,
    pub elapsed_ms: u64,
}

/// Blank ids mean "no conversation selected".
pub(crate) fn selected(conversation_id: &Option<String>) -> Option<&str> {
    conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// GET /api/chat/history (requires auth)
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let view = state
        .reconciler
        .history(&auth.user, &auth.session_key, selected(&query.conversation_id))
        .await?;

    let codec = state.reconciler.codec();
    let title = if view.conversation.title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        view.conversation.title
    };

    Ok(Json(HistoryResponse {
        ok: true,
        conversation_id: view.conversation.id,
        title,
        document_url: view.document_url,
        messages: view
            .messages
            .into_iter()
            .map(|m| MessageItem::from_message(m, codec))
            .collect(),
    }))
}

/// POST /api/chat/send (requires auth)
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let outcome = state
        .reconciler
        .send_turn(
            &auth.user,
            &auth.session_key,
            selected(&req.conversation_id),
            &req.message,
        )
        .await?;

    Ok(Json(SendMessageResponse {
        ok: true,
        conversation_id: outcome.conversation_id,
        message: MessageItem::from_message(outcome.reply, state.reconciler.codec()),
        attachment_delivered: outcome.attachment_delivered,
        elapsed_ms: outcome.elapsed_ms,
    }))
}
