pub mod chat;
pub mod conversations;
pub mod middleware;
pub mod state;
pub mod upload;

pub use middleware::AuthSession;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Room for multipart framing around the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.reconciler.settings().max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let protected = Router::new()
        // Chat endpoints
        .route("/api/chat/history", get(chat::history))
        .route("/api/chat/send", post(chat::send_message))
        .route("/api/chat/upload", post(upload::upload))
        // Conversation management
        .route(
            "/api/conversations",
            get(conversations::list).post(conversations::create),
        )
        .route("/api/conversations/rename", post(conversations::rename))
        .route("/api/conversations/delete", post(conversations::delete))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
