//! Clients for the retrieval-augmented inference backend.

pub mod indexing;
pub mod inference;

pub use indexing::{HttpIndexingClient, IndexingClient};
pub use inference::{ChatRequest, HttpInferenceClient, InferenceClient};

use serde::Serialize;

use crate::db::MessageRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}
