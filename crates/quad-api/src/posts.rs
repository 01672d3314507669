use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use quad_types::api::{Claims, CreatePostRequest};
use quad_types::models::Post;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};
use crate::middleware::ensure_forum_access;

/// Post detail plus the viewer's own vote state, fetched together so the
/// screen renders from one consistent snapshot.
#[derive(Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub voted: bool,
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let posts = state.posts.clone();
    let votes = state.votes.clone();
    let (post, voted) = tokio::task::spawn_blocking(move || {
        let post = posts.fetch_by_id(post_id)?;
        let voted = votes.has_voted(post_id, claims.sub)?;
        Ok::<_, quad_core::CoreError>((post, voted))
    })
    .await
    .map_err(join_error)??;

    Ok(Json(PostDetail { post, voted }))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let posts = state.posts.clone();
    let feed = tokio::task::spawn_blocking(move || posts.list())
        .await
        .map_err(join_error)??;

    Ok(Json(feed))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_forum_access(&state, claims.sub).await?;

    let posts = state.posts.clone();
    let post = tokio::task::spawn_blocking(move || {
        posts.create(claims.sub, &req.title, &req.content, &req.tags)
    })
    .await
    .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(post)))
}
