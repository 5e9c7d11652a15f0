pub mod auth;
pub mod comments;
pub mod posts;
pub mod reactions;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(reactions::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
