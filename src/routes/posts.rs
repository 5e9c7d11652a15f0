use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageRequest};
use crate::routes::reactions;
use crate::social::domain::{NewPost, PostFilter, PostUpdate};
use crate::social::views::{CommentView, PostView};
use crate::social::{CommentId, PostId, UserId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent: Option<CommentId>,
}

#[derive(Deserialize)]
pub struct CommentQuery {
    pub author: Option<UserId>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/like", post(reactions::like_post))
        .route("/posts/{id}/bookmark", post(reactions::bookmark_post))
        .route("/posts/{id}/repost", post(reactions::repost_post))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

/// GET /posts?author=&search=&page=&page_size=
async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<PostView>>> {
    Ok(Json(state.posts.list_posts(filter, page).await?))
}

/// POST /posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<NewPost>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let post = state.posts.create_post(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> AppResult<Json<PostView>> {
    Ok(Json(state.posts.get_post(&id).await?))
}

/// PUT /posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
    Json(update): Json<PostUpdate>,
) -> AppResult<Json<PostView>> {
    Ok(Json(state.posts.update_post(&user.id, &id, update).await?))
}

/// DELETE /posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> AppResult<StatusCode> {
    state.posts.delete_post(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /posts/{id}/comments?author=&page=&page_size=
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Query(query): Query<CommentQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<CommentView>>> {
    let comments = state
        .comments
        .list_comments(&id, query.author.as_ref(), page)
        .await?;
    Ok(Json(comments))
}

/// POST /posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
    Json(input): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let comment = state
        .comments
        .create_comment(&user.id, &id, &input.content, input.parent.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
