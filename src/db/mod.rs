pub mod models;

use chrono::{SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_reactions",
        include_str!("../../migrations/002_reactions.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys, the busy timeout and SQL functions are per-connection
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        register_functions(conn)
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    Ok(pool)
}

/// SQL name of the Unicode case-folding function. SQLite's own `lower()`
/// and `LIKE` only fold ASCII.
pub const FOLD_CASE: &str = "fold_case";

/// Case folding shared by stored text (through SQL) and search terms.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

fn register_functions(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| fold_case(&t)))
        },
    )
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Current UTC time as stored in every `created_at` / `updated_at` column.
/// Fixed-width, so lexical order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// New time-ordered identifier.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
pub(crate) fn test_pool() -> (DbPool, tempfile::TempDir) {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = create_pool(&tmp.path().join("test.db")).unwrap();
    run_migrations(&pool).unwrap();
    (pool, tmp)
}
