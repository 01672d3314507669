use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use quad_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};
use crate::middleware::ensure_forum_access;

/// Toggle the caller's vote. The returned count is re-read after the
/// mutation, never computed client-side.
pub async fn toggle_vote(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let votes = state.votes.clone();
    let outcome = tokio::task::spawn_blocking(move || votes.toggle(post_id, Some(claims.sub)))
        .await
        .map_err(join_error)??;

    Ok(Json(outcome))
}
