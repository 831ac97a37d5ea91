//! Authentication Middleware
//!
//! Bearer token validation for protected REST routes. Tokens are checked by
//! the same verifier the WebSocket gateway uses.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::Identity;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

impl From<Identity> for AuthUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username,
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    // Check for Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    let identity = state
        .verifier
        .verify(token)
        .await
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    request.extensions_mut().insert(AuthUser::from(identity));

    Ok(next.run(request).await)
}
