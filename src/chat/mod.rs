//! Chat turns and uploads against the inference backend.

pub mod context;
pub mod reconciler;
pub mod reply;

pub use context::{build_turn_context, TurnContext, ATTACHMENT_NAME};
pub use reconciler::{
    Collaborators, ContextReconciler, HistoryView, IngestOutcome, ReconcilerSettings, TurnOutcome,
};
pub use reply::InferenceReply;
