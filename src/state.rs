use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::social::{
    DynCommentRepository, DynPostRepository, DynReactionRepository, DynUserRepository,
    SqliteCommentRepository, SqlitePostRepository, SqliteReactionRepository,
    SqliteUserRepository,
};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub users: DynUserRepository,
    pub posts: DynPostRepository,
    pub comments: DynCommentRepository,
    pub reactions: DynReactionRepository,
}

impl AppState {
    /// Wires the SQLite repositories over one shared pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let pagination = config.pagination.clone();
        AppState {
            users: Arc::new(SqliteUserRepository::new(db.clone(), config.auth.clone())),
            posts: Arc::new(SqlitePostRepository::new(db.clone(), pagination.clone())),
            comments: Arc::new(SqliteCommentRepository::new(
                db.clone(),
                pagination.clone(),
                config.threads.clone(),
            )),
            reactions: Arc::new(SqliteReactionRepository::new(db.clone(), pagination)),
            db,
            config,
        }
    }
}
