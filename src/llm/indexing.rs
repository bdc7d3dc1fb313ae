use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::LlmError;

/// Pushes a document into the backend's retrieval index.
#[async_trait]
pub trait IndexingClient: Send + Sync {
    /// `Ok(true)` only when the backend confirms the document was indexed.
    async fn ingest(
        &self,
        file_name: &str,
        bytes: &[u8],
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, LlmError>;
}

#[derive(Deserialize)]
struct IngestResponse {
    #[serde(default)]
    ok: bool,
}

pub struct HttpIndexingClient {
    client: Client,
    base_url: String,
}

impl HttpIndexingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IndexingClient for HttpIndexingClient {
    async fn ingest(
        &self,
        file_name: &str,
        bytes: &[u8],
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, LlmError> {
        let file = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("file", file)
            .text("user_id", user_id.to_string())
            .text("session_id", session_id.to_string())
            .text("prefer_openai", "true");

        let resp = self
            .client
            .post(format!("{}/v1/ingest", self.base_url))
            .multipart(form)
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

        let data: IngestResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(data.ok)
    }
}
