use std::sync::Arc;
use std::time::Duration;
use sqlx::{Pool, Sqlite};
use crate::chat::ContextReconciler;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub reconciler: Arc<ContextReconciler>,
    pub request_timeout: Duration,
}
