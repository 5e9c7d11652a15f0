use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::session;
use crate::config::AuthConfig;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::users::{NewUser, ProfileUpdate};
use crate::social::views::UserView;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me).patch(update_me))
        .route("/me/password", put(change_password))
        .route("/users/{username}", get(profile))
}

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        auth.cookie_name,
        token,
        auth.session_hours * 3600
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Opens a session for `user` and answers with the token in both the body
/// and a cookie.
fn session_response(state: &AppState, user: User, status: StatusCode) -> AppResult<Response> {
    let auth = &state.config.auth;
    let token = session::create_session(&state.db, user.id.as_str(), auth.session_hours)?;
    let body = json!({
        "token": token,
        "user": UserView::from(user),
    });
    Ok((
        status,
        [(header::SET_COOKIE, session_cookie(auth, &token))],
        Json(body),
    )
        .into_response())
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> AppResult<Response> {
    let user = state.users.create_user(input).await?;
    session_response(&state, user, StatusCode::CREATED)
}

/// POST /signin
async fn signin(
    State(state): State<AppState>,
    Json(input): Json<SigninRequest>,
) -> AppResult<Response> {
    let user = state
        .users
        .authenticate(&input.username, &input.password)
        .await?;
    tracing::info!("User {} signed in", user.username);
    session_response(&state, user, StatusCode::OK)
}

/// POST /signout
async fn signout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.token)?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
        Json(json!({ "detail": "Signed out" })),
    )
        .into_response())
}

async fn load_self(state: &AppState, user: &CurrentUser) -> AppResult<User> {
    state
        .users
        .find_by_id(&user.id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// GET /me
async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<UserView>> {
    Ok(Json(load_self(&state, &user).await?.into()))
}

/// PATCH /me
async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<UserView>> {
    let updated = state.users.update_profile(&user.id, update).await?;
    Ok(Json(updated.into()))
}

/// PUT /me/password
async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<PasswordChange>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .users
        .change_password(&user.id, &input.current_password, &input.new_password)
        .await?;
    Ok(Json(json!({ "detail": "Password updated" })))
}

/// GET /users/{username}
async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserView>> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found("User", &username))?;
    Ok(Json(user.into()))
}
