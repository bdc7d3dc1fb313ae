use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{Conversation, ConversationSummary};
use crate::db::{now_millis, truncate_chars, DEFAULT_TITLE, TITLE_DISPLAY_CHARS};
use crate::error::AppError;
use crate::storage::reference;

const MAX_TITLE_CHARS: usize = 255;

pub struct ConversationRepository;

impl ConversationRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        session_key: &str,
        title: &str,
    ) -> Result<Conversation, AppError> {
        let id = Uuid::new_v4().to_string();
        Self::create_with_id(pool, &id, owner_id, session_key, title).await
    }

    /// `create` with a caller-chosen id, for callers that need the id before
    /// the row exists.
    pub async fn create_with_id(
        pool: &Pool<Sqlite>,
        id: &str,
        owner_id: &str,
        session_key: &str,
        title: &str,
    ) -> Result<Conversation, AppError> {
        let now = now_millis();

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
INSERT INTO conversations (id, user_id, session_key, title, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(session_key)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        tracing::debug!(conversation_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(conversation)
    }

    /// Fetch a conversation owned by `owner_id`. Someone else's conversation is
    /// reported as not found.
    pub async fn get_owned(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        id: &str,
    ) -> Result<Conversation, AppError> {
        sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = ? AND user_id = ?"
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))
    }

    pub async fn latest_for_owner(
        pool: &Pool<Sqlite>,
        owner_id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
SELECT * FROM conversations
WHERE user_id = ?
ORDER BY updated_at DESC, rowid DESC
LIMIT 1
            "#
        )
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;

        Ok(conversation)
    }

    /// Explicit id: fetch-or-NotFound within the owner's conversations.
    /// No id: the owner's most recently updated conversation, or a fresh one.
    pub async fn resolve_or_create(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        session_key: &str,
        explicit_id: Option<&str>,
    ) -> Result<Conversation, AppError> {
        if let Some(id) = explicit_id {
            return Self::get_owned(pool, owner_id, id).await;
        }

        match Self::latest_for_owner(pool, owner_id).await? {
            Some(conversation) => Ok(conversation),
            None => Self::create(pool, owner_id, session_key, "").await,
        }
    }

    pub async fn list_for_owner(
        pool: &Pool<Sqlite>,
        owner_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let mut summaries = sqlx::query_as::<_, ConversationSummary>(
            r#"
SELECT id, title, updated_at FROM conversations
WHERE user_id = ?
ORDER BY updated_at DESC, rowid DESC
            "#
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        for summary in summaries.iter_mut().filter(|s| s.title.is_empty()) {
            summary.title = DEFAULT_TITLE.to_string();
        }

        Ok(summaries)
    }

    pub async fn rename(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        id: &str,
        title: &str,
    ) -> Result<Conversation, AppError> {
        let title = truncate_chars(title.trim(), MAX_TITLE_CHARS);
        let title = if title.is_empty() { DEFAULT_TITLE.to_string() } else { title };

        sqlx::query_as::<_, Conversation>(
            r#"
UPDATE conversations SET title = ?, updated_at = ?
WHERE id = ? AND user_id = ?
RETURNING *
            "#,
        )
        .bind(&title)
        .bind(now_millis())
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))
    }

    /// Messages go with the conversation through the cascade.
    pub async fn delete(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        id: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("conversation not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete_all_for_owner(
        pool: &Pool<Sqlite>,
        owner_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM conversations WHERE user_id = ?")
            .bind(owner_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Attach the single document a conversation may ever have.
    ///
    /// `reference` must be the unsigned form. A conversation that already
    /// carries a reference is rejected with `Conflict`, whatever the input.
    /// The attachment starts out pending (not yet consumed by the backend).
    pub async fn attach_document(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        reference: &str,
        extracted_text: &str,
        filename: &str,
    ) -> Result<Conversation, AppError> {
        if reference.trim().is_empty() {
            return Err(AppError::EmptyInput("document reference is empty".to_string()));
        }
        if reference::is_presigned(reference) {
            return Err(AppError::Internal(
                "signed URLs must not be persisted".to_string(),
            ));
        }

        let title = title_from_filename(filename);

        let updated = sqlx::query_as::<_, Conversation>(
            r#"
UPDATE conversations
SET document_ref = ?, document_text = ?, attachment_consumed = 0, title = ?, updated_at = ?
WHERE id = ? AND document_ref = ''
RETURNING *
            "#,
        )
        .bind(reference)
        .bind(extracted_text)
        .bind(&title)
        .bind(now_millis())
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(conversation) => Ok(conversation),
            None => match Self::get_by_id(pool, conversation_id).await? {
                Some(_) => Err(AppError::Conflict(
                    "a document is already attached to this conversation".to_string(),
                )),
                None => Err(AppError::NotFound("conversation not found".to_string())),
            },
        }
    }

    /// Idempotent; a conversation without a document is left untouched.
    pub async fn mark_attachment_consumed(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
UPDATE conversations SET attachment_consumed = 1, updated_at = ?
WHERE id = ? AND document_ref != '' AND attachment_consumed = 0
            "#,
        )
        .bind(now_millis())
        .bind(conversation_id)
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn title_from_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        truncate_chars(base, TITLE_DISPLAY_CHARS)
    }
}
