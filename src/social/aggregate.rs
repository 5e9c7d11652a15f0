// Per-target counts, always recomputed from storage
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::AppResult;
use crate::social::domain::{Reactable, ReactionKind, TargetKind};

/// SQLite caps bound parameters per statement; stay well under it.
const ID_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TargetCounts {
    pub likes_count: i64,
    pub comments_count: i64,
    pub reposts_count: i64,
    pub bookmarks_count: i64,
}

impl TargetCounts {
    fn set(&mut self, kind: ReactionKind, value: i64) {
        match kind {
            ReactionKind::Like => self.likes_count = value,
            ReactionKind::Bookmark => self.bookmarks_count = value,
            ReactionKind::Repost => self.reposts_count = value,
        }
    }
}

/// Number of `kind` reactions on a target. Served by the `(target_kind, target_id)` index.
pub fn reaction_count(
    conn: &Connection,
    target: &impl Reactable,
    kind: ReactionKind,
) -> AppResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE target_kind = ?1 AND target_id = ?2",
        kind.table()
    );
    let count = conn.query_row(
        &sql,
        params![target.kind().as_str(), target.target_id()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Comments directly attached to a target: every comment on a post, or the
/// immediate replies of a comment. Never recursive.
pub fn comment_count(conn: &Connection, target: &impl Reactable) -> AppResult<i64> {
    let sql = match target.kind() {
        TargetKind::Post => "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        TargetKind::Comment => "SELECT COUNT(*) FROM comments WHERE parent_id = ?1",
    };
    let count = conn.query_row(sql, params![target.target_id()], |row| row.get(0))?;
    Ok(count)
}

pub fn counts_for(conn: &Connection, target: &impl Reactable) -> AppResult<TargetCounts> {
    let mut counts = TargetCounts {
        comments_count: comment_count(conn, target)?,
        ..Default::default()
    };
    for kind in ReactionKind::ALL {
        counts.set(kind, reaction_count(conn, target, kind)?);
    }
    Ok(counts)
}

/// Counts for many targets of one kind with a handful of grouped queries
/// instead of four per target. Ids with no rows map to all-zero counts.
pub fn batch_counts(
    conn: &Connection,
    kind: TargetKind,
    ids: &[&str],
) -> AppResult<HashMap<String, TargetCounts>> {
    let mut result: HashMap<String, TargetCounts> = ids
        .iter()
        .map(|id| (id.to_string(), TargetCounts::default()))
        .collect();

    for chunk in ids.chunks(ID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");

        for reaction in ReactionKind::ALL {
            let sql = format!(
                "SELECT target_id, COUNT(*) FROM {} WHERE target_kind = '{}' AND target_id IN ({}) GROUP BY target_id",
                reaction.table(),
                kind.as_str(),
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (id, count) = row?;
                if let Some(counts) = result.get_mut(&id) {
                    counts.set(reaction, count);
                }
            }
        }

        let column = match kind {
            TargetKind::Post => "post_id",
            TargetKind::Comment => "parent_id",
        };
        let sql = format!(
            "SELECT {col}, COUNT(*) FROM comments WHERE {col} IN ({}) GROUP BY {col}",
            placeholders,
            col = column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, count) = row?;
            if let Some(counts) = result.get_mut(&id) {
                counts.comments_count = count;
            }
        }
    }

    Ok(result)
}
