use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use crate::api::middleware::AuthSession;
use crate::api::state::AppState;
use crate::error::AppError;

const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub conversation_id: String,
    pub title: String,
    /// Presigned; the stored reference never leaves the server.
    pub url: String,
    pub indexed: bool,
}

struct UploadForm {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
    conversation_id: Option<String>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut conversation_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            "conversation_id" => {
                let value = field.text().await.map_err(multipart_error)?;
                conversation_id = Some(value);
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::EmptyInput("no file uploaded".to_string()))?;

    Ok(UploadForm {
        file_name,
        content_type,
        bytes,
        conversation_id,
    })
}

/// POST /api/chat/upload (requires auth)
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_form(multipart).await?;
    let size = form.bytes.len();

    let outcome = state
        .reconciler
        .ingest_upload(
            &auth.user,
            &auth.session_key,
            crate::api::chat::selected(&form.conversation_id),
            &form.file_name,
            form.bytes,
            &form.content_type,
        )
        .await?;

    tracing::info!(
        conversation_id = %outcome.conversation.id,
        size,
        indexed = outcome.indexed,
        "Upload processed"
    );

    Ok(Json(UploadResponse {
        ok: true,
        conversation_id: outcome.conversation.id,
        title: outcome.conversation.title,
        url: outcome.display_url,
        indexed: outcome.indexed,
    }))
}
