use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageRequest};
use crate::social::views::ReactionView;
use crate::social::{CommentId, PostId, ReactionFilter, ReactionKind, TargetRef, ToggleOutcome};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/likes", get(list_likes))
        .route("/bookmarks", get(list_bookmarks))
        .route("/reposts", get(list_reposts))
}

/// Shared by the post and comment reaction endpoints.
pub(crate) async fn toggle(
    state: &AppState,
    user: &CurrentUser,
    target: TargetRef,
    kind: ReactionKind,
) -> AppResult<Response> {
    let outcome = state.reactions.toggle(&user.id, &target, kind).await?;
    let response = match outcome {
        ToggleOutcome::Added(reaction) => (
            StatusCode::OK,
            Json(json!({ "status": "added", "reaction": reaction })),
        )
            .into_response(),
        ToggleOutcome::Removed => (
            StatusCode::OK,
            Json(json!({ "status": "removed", "detail": kind.removed_message() })),
        )
            .into_response(),
    };
    Ok(response)
}

async fn list(
    state: AppState,
    kind: ReactionKind,
    filter: ReactionFilter,
    page: PageRequest,
) -> AppResult<Json<Page<ReactionView>>> {
    Ok(Json(state.reactions.list(kind, filter, page).await?))
}

/// GET /likes
async fn list_likes(
    State(state): State<AppState>,
    Query(filter): Query<ReactionFilter>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<ReactionView>>> {
    list(state, ReactionKind::Like, filter, page).await
}

/// GET /bookmarks
async fn list_bookmarks(
    State(state): State<AppState>,
    Query(filter): Query<ReactionFilter>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<ReactionView>>> {
    list(state, ReactionKind::Bookmark, filter, page).await
}

/// GET /reposts
async fn list_reposts(
    State(state): State<AppState>,
    Query(filter): Query<ReactionFilter>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<Page<ReactionView>>> {
    list(state, ReactionKind::Repost, filter, page).await
}

// Path-bound wrappers so each reaction kind gets its own route.

pub(crate) async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Post(id), ReactionKind::Like).await
}

pub(crate) async fn bookmark_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Post(id), ReactionKind::Bookmark).await
}

pub(crate) async fn repost_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<PostId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Post(id), ReactionKind::Repost).await
}

pub(crate) async fn like_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<CommentId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Comment(id), ReactionKind::Like).await
}

pub(crate) async fn bookmark_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<CommentId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Comment(id), ReactionKind::Bookmark).await
}

pub(crate) async fn repost_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<CommentId>,
) -> AppResult<Response> {
    toggle(&state, &user, TargetRef::Comment(id), ReactionKind::Repost).await
}
