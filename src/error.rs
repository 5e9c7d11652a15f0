use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// Bad username/password at sign-in.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// No session, or the session has expired.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} {} not found", what, id))
    }

    /// Stable machine-readable name, rendered as the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "auth_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => {
                tracing::error!("{}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": self.kind(), "detail": detail }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
