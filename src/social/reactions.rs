// Likes, bookmarks and reposts. One implementation serves all three families.
use async_trait::async_trait;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::db::models::Reaction;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};
use crate::social::aggregate;
use crate::social::domain::{
    Reactable, ReactionId, ReactionKind, TargetKind, TargetRef, UserId,
};
use crate::social::posts::require_post;
use crate::social::threads::require_comment;
use crate::social::views::{reaction_views, ReactionView};
use crate::state::DbPool;

#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    Added(Reaction),
    Removed,
}

impl ToggleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ToggleOutcome::Added(_) => "added",
            ToggleOutcome::Removed => "removed",
        }
    }
}

/// Narrows a reaction listing. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReactionFilter {
    #[serde(rename = "user")]
    pub actor: Option<UserId>,
    #[serde(rename = "type")]
    pub target_kind: Option<TargetKind>,
    #[serde(rename = "object_id")]
    pub target_id: Option<String>,
}

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// On a post the reaction flips between present and absent. On a comment
    /// it can only be added; a repeat is a conflict.
    async fn toggle(
        &self,
        actor: &UserId,
        target: &TargetRef,
        kind: ReactionKind,
    ) -> AppResult<ToggleOutcome>;

    async fn count(&self, target: &TargetRef, kind: ReactionKind) -> AppResult<i64>;

    /// Most recent first.
    async fn list(
        &self,
        kind: ReactionKind,
        filter: ReactionFilter,
        page: PageRequest,
    ) -> AppResult<Page<ReactionView>>;
}

pub struct SqliteReactionRepository {
    pool: DbPool,
    pagination: PaginationConfig,
}

impl SqliteReactionRepository {
    pub fn new(pool: DbPool, pagination: PaginationConfig) -> Self {
        Self { pool, pagination }
    }
}

fn ensure_target(conn: &Connection, target: &TargetRef) -> AppResult<()> {
    match target {
        TargetRef::Post(id) => require_post(conn, id).map(|_| ()),
        TargetRef::Comment(id) => require_comment(conn, id).map(|_| ()),
    }
}

fn insert_reaction(
    conn: &Connection,
    actor: &UserId,
    target: &TargetRef,
    kind: ReactionKind,
) -> AppResult<Option<Reaction>> {
    let reaction = Reaction {
        id: ReactionId::generate(),
        user_id: actor.clone(),
        target_kind: target.kind(),
        target_id: target.target_id().to_string(),
        created_at: now_timestamp(),
    };
    let inserted = conn.execute(
        &format!(
            "INSERT INTO {} (id, user_id, target_kind, target_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, target_kind, target_id) DO NOTHING",
            kind.table()
        ),
        params![
            reaction.id.as_str(),
            reaction.user_id.as_str(),
            reaction.target_kind.as_str(),
            reaction.target_id,
            reaction.created_at
        ],
    )?;
    Ok((inserted == 1).then_some(reaction))
}

#[async_trait]
impl ReactionRepository for SqliteReactionRepository {
    async fn toggle(
        &self,
        actor: &UserId,
        target: &TargetRef,
        kind: ReactionKind,
    ) -> AppResult<ToggleOutcome> {
        let mut conn = self.pool.get()?;
        // Write lock up front: toggles on the same target run one at a time
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_target(&tx, target)?;

        let outcome = match target.kind() {
            TargetKind::Post => {
                let removed = tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                        kind.table()
                    ),
                    params![actor.as_str(), target.kind().as_str(), target.target_id()],
                )?;
                if removed > 0 {
                    ToggleOutcome::Removed
                } else {
                    let reaction = insert_reaction(&tx, actor, target, kind)?.ok_or_else(|| {
                        AppError::Internal(format!("{} insert lost after delete", kind))
                    })?;
                    ToggleOutcome::Added(reaction)
                }
            }
            TargetKind::Comment => match insert_reaction(&tx, actor, target, kind)? {
                Some(reaction) => ToggleOutcome::Added(reaction),
                None => return Err(AppError::Conflict(kind.duplicate_message().into())),
            },
        };
        tx.commit()?;

        tracing::debug!(
            "{} {} on {} {} by {}",
            kind,
            outcome.label(),
            target.kind(),
            target.target_id(),
            actor
        );
        Ok(outcome)
    }

    async fn count(&self, target: &TargetRef, kind: ReactionKind) -> AppResult<i64> {
        let conn = self.pool.get()?;
        ensure_target(&conn, target)?;
        aggregate::reaction_count(&conn, target, kind)
    }

    async fn list(
        &self,
        kind: ReactionKind,
        filter: ReactionFilter,
        page: PageRequest,
    ) -> AppResult<Page<ReactionView>> {
        let window = page.window(&self.pagination)?;
        let conn = self.pool.get()?;

        let predicate = "(?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR target_kind = ?2)
             AND (?3 IS NULL OR target_id = ?3)";
        let actor = filter.actor.as_ref().map(|a| a.as_str());
        let target_kind = filter.target_kind.map(|k| k.as_str());
        let target_id = filter.target_id.as_deref();

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {}", kind.table(), predicate),
            params![actor, target_kind, target_id],
            |row| row.get(0),
        )?;

        let reactions = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5",
                Reaction::COLUMNS,
                kind.table(),
                predicate
            ))?;
            let rows = stmt
                .query_map(
                    params![actor, target_kind, target_id, window.limit(), window.offset()],
                    Reaction::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        Page::new(window, count, reaction_views(&conn, reactions)?)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynReactionRepository = Arc<dyn ReactionRepository>;
