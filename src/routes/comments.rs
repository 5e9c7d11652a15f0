use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::reactions;
use crate::social::views::CommentView;
use crate::social::CommentId;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/comments/{id}",
            get(get_thread).put(update_comment).delete(delete_comment),
        )
        .route("/comments/{id}/like", post(reactions::like_comment))
        .route("/comments/{id}/bookmark", post(reactions::bookmark_comment))
        .route("/comments/{id}/repost", post(reactions::repost_comment))
}

/// GET /comments/{id}, the comment and its whole reply tree.
async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> AppResult<Json<CommentView>> {
    Ok(Json(state.comments.get_thread(&id).await?))
}

/// PUT /comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<CommentId>,
    Json(input): Json<UpdateCommentRequest>,
) -> AppResult<Json<CommentView>> {
    let comment = state
        .comments
        .update_comment(&user.id, &id, &input.content)
        .await?;
    Ok(Json(comment))
}

/// DELETE /comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<CommentId>,
) -> AppResult<StatusCode> {
    state.comments.delete_comment(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
