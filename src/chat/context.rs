use crate::db::{AttachmentState, Conversation, Message, MessageRole};
use crate::llm::ChatMessage;

/// Name the extracted document is presented under.
pub const ATTACHMENT_NAME: &str = "uploaded.pdf.md";

const ATTACHMENT_INSTRUCTIONS: &str = "The following is context extracted from the user's \
uploaded document. Do not copy it verbatim; summarize/reference only.";

/// What goes out to the inference backend for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    /// Oldest first.
    pub messages: Vec<ChatMessage>,
    pub attachment: Option<ChatMessage>,
}

impl TurnContext {
    pub fn carries_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}

/// History is the last `window` of `recent_messages`. The extracted document
/// is attached only while the conversation's attachment is still pending.
pub fn build_turn_context(
    conversation: &Conversation,
    recent_messages: &[Message],
    window: usize,
) -> TurnContext {
    let skip = recent_messages.len().saturating_sub(window);
    let messages = recent_messages[skip..]
        .iter()
        .map(|m| ChatMessage::new(m.role, m.content.clone()))
        .collect();

    let attachment = match conversation.attachment_state() {
        AttachmentState::Pending if !conversation.document_text.trim().is_empty() => {
            Some(attachment_message(&conversation.document_text))
        }
        _ => None,
    };

    TurnContext {
        messages,
        attachment,
    }
}

fn attachment_message(document_text: &str) -> ChatMessage {
    ChatMessage::new(
        MessageRole::System,
        format!(
            "{}\n\n[{}]\n{}",
            ATTACHMENT_INSTRUCTIONS, ATTACHMENT_NAME, document_text
        ),
    )
}
