// Accounts: signup, credential checks, profile edits
use async_trait::async_trait;
use rusqlite::{params, ErrorCode, OptionalExtension};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::password::{hash_password, verify_password};
use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::social::domain::UserId;
use crate::social::views::find_user;
use crate::state::DbPool;

const MAX_USERNAME_LEN: usize = 150;
const MAX_PHONE_LEN: usize = 15;
const MAX_PROFILE_FIELD_LEN: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, input: NewUser) -> AppResult<User>;

    /// Verify a username/password pair.
    async fn authenticate(&self, username: &str, password: &str) -> AppResult<User>;

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> AppResult<User>;

    async fn change_password(&self, id: &UserId, current: &str, new: &str) -> AppResult<()>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
    policy: AuthConfig,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool, policy: AuthConfig) -> Self {
        Self { pool, policy }
    }

    fn check_password_policy(&self, password: &str) -> AppResult<()> {
        if password.chars().count() < self.policy.min_password_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.policy.min_password_length
            )));
        }
        Ok(())
    }
}

fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be {} characters or less",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(AppError::Validation(
            "Username may only contain letters, digits and @/./+/-/_".into(),
        ));
    }
    Ok(username.to_string())
}

fn validate_email(email: Option<String>) -> AppResult<Option<String>> {
    match email.map(|e| e.trim().to_string()) {
        None => Ok(None),
        Some(e) if e.is_empty() => Ok(None),
        Some(e) if !e.contains('@') || e.chars().count() > MAX_PROFILE_FIELD_LEN => {
            Err(AppError::Validation("Enter a valid email address".into()))
        }
        Some(e) => Ok(Some(e)),
    }
}

fn bounded(field: &str, value: Option<String>, max: usize) -> AppResult<Option<String>> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::Validation(format!(
            "{} must be {} characters or less",
            field, max
        ))),
        other => Ok(other),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, input: NewUser) -> AppResult<User> {
        let username = validate_username(&input.username)?;
        self.check_password_policy(&input.password)?;
        let email = validate_email(input.email)?;
        let full_name = bounded("Full name", input.full_name, MAX_PROFILE_FIELD_LEN)?;

        let user = User {
            id: UserId::new(new_id()),
            username,
            email,
            full_name,
            bio: None,
            phone_number: None,
            avatar_url: None,
            password_hash: hash_password(&input.password, self.policy.bcrypt_cost)?,
            created_at: now_timestamp(),
        };

        let conn = self.pool.get()?;
        // The UNIQUE constraint decides races between concurrent signups
        let inserted = conn.execute(
            "INSERT INTO users (id, username, email, full_name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.as_str(),
                user.username,
                user.email,
                user.full_name,
                user.password_hash,
                user.created_at
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Validation(
                    "A user with that username already exists".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    async fn authenticate(&self, username: &str, password: &str) -> AppResult<User> {
        match self.find_by_username(username).await? {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            _ => {
                tracing::warn!("Rejected sign-in for {}", username);
                Err(AppError::InvalidCredentials)
            }
        }
    }

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        find_user(&conn, id)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS);
        let user = conn
            .query_row(&sql, params![username.trim()], User::from_row)
            .optional()?;
        Ok(user)
    }

    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> AppResult<User> {
        let mut user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))?;

        if update.email.is_some() {
            user.email = validate_email(update.email)?;
        }
        if let Some(full_name) = bounded("Full name", update.full_name, MAX_PROFILE_FIELD_LEN)? {
            user.full_name = Some(full_name);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        if let Some(phone) = bounded("Phone number", update.phone_number, MAX_PHONE_LEN)? {
            user.phone_number = Some(phone);
        }
        if let Some(avatar) = bounded("Avatar URL", update.avatar_url, MAX_PROFILE_FIELD_LEN)? {
            user.avatar_url = Some(avatar);
        }

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET email = ?1, full_name = ?2, bio = ?3, phone_number = ?4, avatar_url = ?5
             WHERE id = ?6",
            params![
                user.email,
                user.full_name,
                user.bio,
                user.phone_number,
                user.avatar_url,
                id.as_str()
            ],
        )?;
        Ok(user)
    }

    async fn change_password(&self, id: &UserId, current: &str, new: &str) -> AppResult<()> {
        let user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))?;
        if !verify_password(current, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }
        self.check_password_policy(new)?;

        let hash = hash_password(new, self.policy.bcrypt_cost)?;
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![hash, id.as_str()],
        )?;
        tracing::info!("Password changed for {}", user.username);
        Ok(())
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynUserRepository = Arc<dyn UserRepository>;
