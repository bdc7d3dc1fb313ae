use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_chat::{
    api::{create_router, AppState},
    chat::{Collaborators, ContextReconciler, ReconcilerSettings},
    config::Config,
    db::{self, SessionRepository},
    error::AppError,
    ingest::DocumentIngestor,
    llm::{HttpIndexingClient, HttpInferenceClient},
    storage::{S3ObjectStore, SigV4Signer, StorageKeyCodec},
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pdf_chat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting PDF chat server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded");

    // Setup database and run migrations
    let db = db::connect(&config.database).await?;
    tracing::info!("✅ Database ready: {}", config.database.url);

    // Storage and inference collaborators
    let signer = Arc::new(SigV4Signer::new(config.storage.clone()));
    let codec = Arc::new(StorageKeyCodec::new(config.storage.clone(), signer.clone()));
    let inference_timeout = Duration::from_secs(config.inference.timeout_secs);

    let upload_timeout = Duration::from_secs(config.storage.upload_timeout_secs);

    let object_store = S3ObjectStore::new(signer, upload_timeout)
        .map_err(|e| AppError::Config(format!("Object store client: {}", e)))?;
    let inference = HttpInferenceClient::new(&config.inference.base_url, inference_timeout)
        .map_err(|e| AppError::Config(format!("Inference client: {}", e)))?;
    let indexing = HttpIndexingClient::new(&config.inference.base_url, inference_timeout)
        .map_err(|e| AppError::Config(format!("Indexing client: {}", e)))?;

    tracing::info!(
        bucket = %config.storage.bucket,
        region = %config.storage.region,
        inference = %config.inference.base_url,
        "✅ Collaborators configured"
    );

    let services = Collaborators {
        inference: Arc::new(inference),
        indexing: Arc::new(indexing),
        object_store: Arc::new(object_store),
        codec,
        ingestor: DocumentIngestor::pdf(),
    };
    let reconciler = ContextReconciler::new(
        db.clone(),
        services,
        ReconcilerSettings::from_config(&config),
    );

    // Create shared application state
    let state = AppState {
        db: db.clone(),
        reconciler: Arc::new(reconciler),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    };

    // Spawn background task for session cleanup
    {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Every hour
            loop {
                interval.tick().await;
                match SessionRepository::cleanup_expired(&db_clone).await {
                    Ok(removed) => tracing::debug!("🧹 Expired sessions cleaned up: {}", removed),
                    Err(e) => tracing::error!("❌ Session cleanup failed: {}", e),
                }
            }
        });
        tracing::info!("✅ Session cleanup task started (runs hourly)");
    }

    // Build router
    let app = create_router(state);

    // Bind and serve
    let addr = config.server_address();
    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);
    tracing::info!("");
    tracing::info!("📚 API Endpoints:");
    tracing::info!("  GET  /api/chat/history          - Conversation with recent messages");
    tracing::info!("  POST /api/chat/send             - Send a message");
    tracing::info!("  POST /api/chat/upload           - Attach a PDF");
    tracing::info!("  GET  /api/conversations         - List conversations");
    tracing::info!("  POST /api/conversations         - Start a conversation");
    tracing::info!("  POST /api/conversations/rename  - Rename a conversation");
    tracing::info!("  POST /api/conversations/delete  - Delete a conversation");
    tracing::info!("");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
