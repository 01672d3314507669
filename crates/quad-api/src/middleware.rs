use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use quad_core::CoreError;

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;

/// Extract and validate the bearer JWT, making `Claims` available to
/// downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Core(CoreError::Unauthorized))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Core(CoreError::Unauthorized))?;

    let claims = decode_token(&state.jwt_secret, token)
        .map_err(|_| ApiError::Core(CoreError::Unauthorized))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Forum routes additionally require a completed profile; a bare identity
/// mid-signup is authenticated but not yet forum-capable.
pub(crate) async fn ensure_forum_access(
    state: &AppState,
    user_id: uuid::Uuid,
) -> Result<(), ApiError> {
    let gate = state.gate.clone();
    let allowed = tokio::task::spawn_blocking(move || gate.profile_complete(user_id))
        .await
        .map_err(crate::error::join_error)?;

    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "complete your profile to use the forum".into(),
        ))
    }
}
