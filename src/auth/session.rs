use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::error::AppResult;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = crate::db::new_id();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve a live session token to its user.
pub fn find_session_user(pool: &DbPool, token: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let columns = User::COLUMNS
        .split(", ")
        .map(|c| format!("u.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        columns
    );
    let user = conn
        .query_row(&sql, params![token], User::from_row)
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_timestamp, test_pool};

    fn insert_user(pool: &DbPool) {
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, password_hash, created_at) VALUES ('u1', 'alice', 'x', ?1)",
                params![now_timestamp()],
            )
            .unwrap();
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn session_resolves_to_its_user_until_deleted() {
        let (pool, _tmp) = test_pool();
        insert_user(&pool);

        let token = create_session(&pool, "u1", 1).unwrap();
        let user = find_session_user(&pool, &token).unwrap().unwrap();
        assert_eq!(user.username, "alice");

        delete_session(&pool, &token).unwrap();
        assert!(find_session_user(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_ignored() {
        let (pool, _tmp) = test_pool();
        insert_user(&pool);
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO sessions (id, user_id, token, expires_at) VALUES ('s1', 'u1', 'old', datetime('now', '-1 hours'))",
                [],
            )
            .unwrap();

        assert!(find_session_user(&pool, "old").unwrap().is_none());
    }
}
