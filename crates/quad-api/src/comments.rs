use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use quad_types::api::{AddCommentRequest, Claims};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};
use crate::middleware::ensure_forum_access;

pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let comments = state.comments.clone();
    let listed = tokio::task::spawn_blocking(move || comments.list(post_id))
        .await
        .map_err(join_error)??;

    Ok(Json(listed))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let comments = state.comments.clone();
    let comment =
        tokio::task::spawn_blocking(move || comments.add(post_id, Some(claims.sub), &req.content))
            .await
            .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(comment)))
}
