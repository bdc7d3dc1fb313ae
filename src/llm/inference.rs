use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{ChatMessage, LlmError};
use crate::config::GenerationParams;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
    pub session_id: String,
    pub params: GenerationParams,
    /// Document context for this turn, sent after the history.
    pub attachment: Option<ChatMessage>,
}

impl ChatRequest {
    /// History with blank entries dropped, then the attachment if any.
    pub fn outgoing_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .chain(self.attachment.iter())
            .filter_map(|m| {
                let content = m.content.trim();
                (!content.is_empty()).then(|| ChatMessage::new(m.role, content))
            })
            .collect()
    }
}

/// Returns the backend's raw JSON reply; interpretation is up to the caller.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<serde_json::Value, LlmError>;
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    user_id: &'a str,
    session_id: &'a str,
    messages: Vec<ChatMessage>,
    k_internal: u32,
    k_external: u32,
    cap_internal: u32,
    cap_external: u32,
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
}

impl<'a> ChatPayload<'a> {
    fn from_request(request: &'a ChatRequest) -> Self {
        let p = &request.params;
        Self {
            user_id: &request.user_id,
            session_id: &request.session_id,
            messages: request.outgoing_messages(),
            k_internal: p.k_internal,
            k_external: p.k_external,
            cap_internal: p.cap_internal,
            cap_external: p.cap_external,
            max_new_tokens: p.max_tokens,
            temperature: p.temperature,
            top_p: p.top_p,
            repetition_penalty: p.repetition_penalty,
        }
    }
}

pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
}

impl HttpInferenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn chat(&self, request: &ChatRequest) -> Result<serde_json::Value, LlmError> {
        let body = ChatPayload::from_request(request);
        tracing::debug!(
            session_id = %request.session_id,
            messages = body.messages.len(),
            with_attachment = request.attachment.is_some(),
            "Calling inference backend"
        );

        let resp = self
            .client
            .post(format!("{}/v1/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }
}
