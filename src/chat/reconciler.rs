use std::sync::Arc;
use std::time::Instant;

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::chat::context::{build_turn_context, TurnContext};
use crate::chat::reply::InferenceReply;
use crate::config::{ChatConfig, Config, GenerationParams, DEFAULT_MAX_UPLOAD_BYTES};
use crate::db::{Conversation, ConversationRepository, Message, MessageRepository, MessageRole, User};
use crate::error::AppError;
use crate::ingest::DocumentIngestor;
use crate::llm::{ChatRequest, IndexingClient, InferenceClient};
use crate::storage::{upload_prefix, ObjectStore, StorageKeyCodec};

/// External services the reconciler drives.
#[derive(Clone)]
pub struct Collaborators {
    pub inference: Arc<dyn InferenceClient>,
    pub indexing: Arc<dyn IndexingClient>,
    pub object_store: Arc<dyn ObjectStore>,
    pub codec: Arc<StorageKeyCodec>,
    pub ingestor: DocumentIngestor,
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub chat: ChatConfig,
    pub generation: GenerationParams,
    pub max_upload_bytes: usize,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chat: config.chat.clone(),
            generation: config.inference.generation.clone(),
            max_upload_bytes: config.upload_max_bytes,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            generation: GenerationParams::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub reply: Message,
    /// The document went out inline with this turn and is now consumed.
    pub attachment_delivered: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub conversation: Conversation,
    /// Unsigned, as persisted.
    pub reference: String,
    /// Time-limited URL for the browser.
    pub display_url: String,
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryView {
    pub conversation: Conversation,
    /// Signed; empty when the conversation has no document.
    pub document_url: String,
    pub messages: Vec<Message>,
}

/// Keeps a conversation's attached document and the inference backend in
/// step: the extracted text is sent inline until the backend is known to have
/// it, either from indexing at upload or from one successful inline delivery.
#[derive(Clone)]
pub struct ContextReconciler {
    db: Pool<Sqlite>,
    services: Collaborators,
    settings: ReconcilerSettings,
}

impl ContextReconciler {
    pub fn new(db: Pool<Sqlite>, services: Collaborators, settings: ReconcilerSettings) -> Self {
        Self {
            db,
            services,
            settings,
        }
    }

    pub fn codec(&self) -> &StorageKeyCodec {
        &self.services.codec
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub fn turn_context(&self, conversation: &Conversation, recent: &[Message]) -> TurnContext {
        build_turn_context(conversation, recent, self.history_window())
    }

    /// One user turn. Inference failures become the assistant's reply; the
    /// user message is never left unanswered.
    pub async fn send_turn(
        &self,
        owner: &User,
        session_key: &str,
        conversation_id: Option<&str>,
        content: &str,
    ) -> Result<TurnOutcome, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::EmptyInput("message is empty".to_string()));
        }

        let conversation =
            ConversationRepository::resolve_or_create(&self.db, &owner.id, session_key, conversation_id)
                .await?;
        MessageRepository::append(&self.db, &conversation.id, MessageRole::User, content).await?;

        let recent =
            MessageRepository::recent(&self.db, &conversation.id, self.settings.chat.history_window)
                .await?;
        let context = self.turn_context(&conversation, &recent);
        let carries_attachment = context.carries_attachment();

        let request = ChatRequest {
            messages: context.messages,
            user_id: owner.backend_id().to_string(),
            session_id: conversation.id.clone(),
            params: self.settings.generation.clone(),
            attachment: context.attachment,
        };

        let started = Instant::now();
        let (reply_text, delivered) = match self.services.inference.chat(&request).await {
            Ok(value) => (InferenceReply::from_value(&value).into_text(), carries_attachment),
            Err(e) => {
                tracing::warn!(conversation_id = %conversation.id, "Inference call failed: {}", e);
                (format!("LLM error: {}", e), false)
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let reply =
            MessageRepository::append(&self.db, &conversation.id, MessageRole::Assistant, &reply_text)
                .await?;

        if delivered {
            ConversationRepository::mark_attachment_consumed(&self.db, &conversation.id).await?;
            tracing::info!(conversation_id = %conversation.id, "Attachment delivered inline");
        }

        tracing::debug!(conversation_id = %conversation.id, elapsed_ms, "Turn completed");
        Ok(TurnOutcome {
            conversation_id: conversation.id,
            reply,
            attachment_delivered: delivered,
            elapsed_ms,
        })
    }

    /// Store, attach, extract and index an uploaded document.
    ///
    /// Without `conversation_id` a new conversation is started. Extraction and
    /// indexing failures degrade the outcome but never fail the call.
    pub async fn ingest_upload(
        &self,
        owner: &User,
        session_key: &str,
        conversation_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<IngestOutcome, AppError> {
        if bytes.is_empty() {
            return Err(AppError::EmptyInput("uploaded file is empty".to_string()));
        }
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "file exceeds {} bytes",
                self.settings.max_upload_bytes
            )));
        }

        let existing = match conversation_id {
            Some(id) => {
                let conversation = ConversationRepository::get_owned(&self.db, &owner.id, id).await?;
                if conversation.has_document() {
                    return Err(AppError::Conflict(
                        "a document is already attached to this conversation".to_string(),
                    ));
                }
                Some(conversation)
            }
            None => None,
        };
        // A new conversation is only created once the bytes are stored.
        let target_id = existing
            .as_ref()
            .map_or_else(|| Uuid::new_v4().to_string(), |c| c.id.clone());

        let codec = &self.services.codec;
        let key = codec.mint_key(file_name, &upload_prefix(&owner.id, &target_id));
        self.services
            .object_store
            .put(codec.bucket(), &key, &bytes, content_type)
            .await
            .map_err(|e| AppError::Upstream(format!("object store: {}", e)))?;
        let reference = codec.to_unsigned_reference(&key);

        let conversation = match existing {
            Some(conversation) => conversation,
            None => {
                ConversationRepository::create_with_id(&self.db, &target_id, &owner.id, session_key, "")
                    .await?
            }
        };

        let ingestor = self.services.ingestor.clone();
        let (text, bytes) = tokio::task::spawn_blocking(move || {
            let text = ingestor.extract_text(&bytes);
            (text, bytes)
        })
        .await
        .map_err(|e| AppError::Internal(format!("extraction task failed: {}", e)))?;

        let mut conversation = ConversationRepository::attach_document(
            &self.db,
            &conversation.id,
            &reference,
            &text,
            file_name,
        )
        .await?;
        tracing::info!(conversation_id = %conversation.id, key = %key, "Document attached");

        let indexed = match self
            .services
            .indexing
            .ingest(file_name, &bytes, owner.backend_id(), &conversation.id)
            .await
        {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation.id, "Indexing failed: {}", e);
                false
            }
        };

        if indexed {
            ConversationRepository::mark_attachment_consumed(&self.db, &conversation.id).await?;
            if let Some(updated) = ConversationRepository::get_by_id(&self.db, &conversation.id).await? {
                conversation = updated;
            }
        }

        Ok(IngestOutcome {
            display_url: codec.presign_for_display(&reference),
            reference,
            conversation,
            indexed,
        })
    }

    /// The conversation to display with its newest messages.
    pub async fn history(
        &self,
        owner: &User,
        session_key: &str,
        conversation_id: Option<&str>,
    ) -> Result<HistoryView, AppError> {
        let conversation =
            ConversationRepository::resolve_or_create(&self.db, &owner.id, session_key, conversation_id)
                .await?;
        let messages =
            MessageRepository::recent(&self.db, &conversation.id, self.settings.chat.display_window)
                .await?;

        Ok(HistoryView {
            document_url: self.services.codec.presign_for_display(&conversation.document_ref),
            conversation,
            messages,
        })
    }

    fn history_window(&self) -> usize {
        usize::try_from(self.settings.chat.history_window).unwrap_or(0)
    }
}
