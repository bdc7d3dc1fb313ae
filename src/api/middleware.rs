use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::db::{SessionRepository, User, UserRepository};
use crate::error::AppError;

/// Who is calling, attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    /// Correlates conversations started within this login session.
    pub session_key: String,
}

/// Authentication middleware - validates session tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid Authorization format".to_string()))?;

    let session = SessionRepository::get_by_token(&state.db, token)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;

    let user = UserRepository::get_by_id(&state.db, &session.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists".to_string()))?;

    request.extensions_mut().insert(AuthSession {
        user,
        session_key: session.id,
    });

    Ok(next.run(request).await)
}
