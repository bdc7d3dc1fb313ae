use sqlx::{Pool, Sqlite};

use crate::db::models::{Message, MessageRole};
use crate::db::{now_millis, truncate_chars, TITLE_DISPLAY_CHARS};
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    /// Append a message and bump the conversation.
    ///
    /// `created_at` never goes backwards within a conversation. The first user
    /// message names an untitled conversation.
    pub async fn append(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, AppError> {
        let mut tx = pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("conversation not found".to_string()));
        }

        let previous: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await?;
        let created_at = previous.map_or(now_millis(), |prev| prev.max(now_millis()));

        let message = sqlx::query_as::<_, Message>(
            r#"
INSERT INTO messages (conversation_id, role, content, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        let derived_title = match role {
            MessageRole::User => truncate_chars(content.trim(), TITLE_DISPLAY_CHARS),
            _ => String::new(),
        };

        sqlx::query(
            r#"
UPDATE conversations
SET updated_at = ?,
    title = CASE WHEN title = '' AND ? != '' THEN ? ELSE title END
WHERE id = ?
            "#,
        )
        .bind(created_at)
        .bind(&derived_title)
        .bind(&derived_title)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// The newest `limit` messages, oldest first.
    pub async fn recent(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut messages = sqlx::query_as::<_, Message>(
            r#"
SELECT * FROM messages
WHERE conversation_id = ?
ORDER BY id DESC
LIMIT ?
            "#
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn count(pool: &Pool<Sqlite>, conversation_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
