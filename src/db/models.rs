use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

impl User {
    /// Identity forwarded to the inference and indexing backends.
    pub fn backend_id(&self) -> &str {
        if self.email.is_empty() {
            &self.username
        } else {
            &self.email
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: Option<String>,
    pub session_key: String,
    pub title: String,
    /// Unsigned storage reference of the attached document, `""` when none.
    pub document_ref: String,
    /// Extracted document text, `""` when none.
    #[serde(skip_serializing)]
    pub document_text: String,
    pub attachment_consumed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Relationship between a conversation's document and the inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    None,
    Pending,
    Consumed,
}

impl Conversation {
    pub fn attachment_state(&self) -> AttachmentState {
        if self.document_ref.is_empty() {
            AttachmentState::None
        } else if self.attachment_consumed {
            AttachmentState::Consumed
        } else {
            AttachmentState::Pending
        }
    }

    pub fn has_document(&self) -> bool {
        !self.document_ref.is_empty()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub file_url: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DeletionStatus {
    pub user_id: String,
    pub pending_since: Option<i64>,
    pub pending_until: Option<i64>,
}

impl DeletionStatus {
    /// Pending iff `pending_until` is set and still in the future.
    pub fn is_pending_at(&self, now_millis: i64) -> bool {
        matches!(self.pending_until, Some(until) if now_millis < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(document_ref: &str, consumed: bool) -> Conversation {
        Conversation {
            id: "c1".into(),
            user_id: Some("u1".into()),
            session_key: String::new(),
            title: String::new(),
            document_ref: document_ref.into(),
            document_text: String::new(),
            attachment_consumed: consumed,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn attachment_state_follows_reference_and_flag() {
        assert_eq!(conversation("", false).attachment_state(), AttachmentState::None);
        assert_eq!(conversation("", true).attachment_state(), AttachmentState::None);
        assert_eq!(
            conversation("https://b.s3.r.amazonaws.com/k", false).attachment_state(),
            AttachmentState::Pending
        );
        assert_eq!(
            conversation("https://b.s3.r.amazonaws.com/k", true).attachment_state(),
            AttachmentState::Consumed
        );
    }

    #[test]
    fn deletion_pending_requires_future_deadline() {
        let mut status = DeletionStatus {
            user_id: "u1".into(),
            pending_since: None,
            pending_until: None,
        };
        assert!(!status.is_pending_at(100));

        status.pending_until = Some(200);
        assert!(status.is_pending_at(100));
        assert!(!status.is_pending_at(200));
        assert!(!status.is_pending_at(300));
    }

    #[test]
    fn backend_id_prefers_email() {
        let mut user = User {
            id: "u1".into(),
            username: "alice".into(),
            email: String::new(),
            created_at: 0,
        };
        assert_eq!(user.backend_id(), "alice");
        user.email = "alice@example.com".into();
        assert_eq!(user.backend_id(), "alice@example.com");
    }
}
