// Comment threads: nested replies under a post
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::config::{PaginationConfig, ThreadConfig};
use crate::db::models::Comment;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};
use crate::social::aggregate::{self, TargetCounts};
use crate::social::domain::{
    authorize, validate_content, CommentId, PostId, ReactionKind, TargetKind, UserId,
};
use crate::social::posts::require_post;
use crate::social::views::{comment_view, Authors, CommentView};
use crate::state::DbPool;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// `parent`, when given, must be a comment on the same post.
    async fn create_comment(
        &self,
        actor: &UserId,
        post_id: &PostId,
        content: &str,
        parent: Option<&CommentId>,
    ) -> AppResult<CommentView>;

    /// The comment with its reply tree, replies oldest first at every level.
    /// Levels past the configured depth are left out and their parents carry
    /// `has_more_replies`; the client continues from those comments.
    async fn get_thread(&self, id: &CommentId) -> AppResult<CommentView>;

    /// Top-level comments of a post, or every comment by `author` at any
    /// depth when filtered. Each entry carries its (depth-limited) reply tree.
    async fn list_comments(
        &self,
        post_id: &PostId,
        author: Option<&UserId>,
        page: PageRequest,
    ) -> AppResult<Page<CommentView>>;

    async fn update_comment(
        &self,
        actor: &UserId,
        id: &CommentId,
        content: &str,
    ) -> AppResult<CommentView>;

    /// Author only. Removes every descendant reply too; returns how many
    /// comments went.
    async fn delete_comment(&self, actor: &UserId, id: &CommentId) -> AppResult<usize>;
}

pub struct SqliteCommentRepository {
    pool: DbPool,
    pagination: PaginationConfig,
    max_depth: usize,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool, pagination: PaginationConfig, threads: ThreadConfig) -> Self {
        Self {
            pool,
            pagination,
            max_depth: threads.max_depth,
        }
    }
}

pub(crate) fn find_comment(conn: &Connection, id: &CommentId) -> AppResult<Option<Comment>> {
    let sql = format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS);
    let comment = conn
        .query_row(&sql, params![id.as_str()], Comment::from_row)
        .optional()?;
    Ok(comment)
}

pub(crate) fn require_comment(conn: &Connection, id: &CommentId) -> AppResult<Comment> {
    find_comment(conn, id)?.ok_or_else(|| AppError::not_found("Comment", id))
}

fn reply_ids(conn: &Connection, parent: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM comments WHERE parent_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let ids = stmt
        .query_map(params![parent], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Delete a comment and everything reachable below it, plus the reactions
/// on each removed comment. Walks the tree with an explicit queue and deletes
/// leaves first, so it does not depend on the storage-level cascade.
pub(crate) fn purge_comments(conn: &Connection, root: &CommentId) -> AppResult<usize> {
    let mut doomed = vec![root.as_str().to_string()];
    let mut queue = VecDeque::from([root.as_str().to_string()]);
    while let Some(id) = queue.pop_front() {
        for child in reply_ids(conn, &id)? {
            doomed.push(child.clone());
            queue.push_back(child);
        }
    }

    for id in doomed.iter().rev() {
        for kind in ReactionKind::ALL {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE target_kind = 'comment' AND target_id = ?1",
                    kind.table()
                ),
                params![id],
            )?;
        }
        conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    }
    Ok(doomed.len())
}

/// Every comment of one post, indexed by parent, loaded in a single query.
struct ThreadIndex {
    comments: Vec<Comment>,
    position: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
}

impl ThreadIndex {
    fn load(conn: &Connection, post_id: &PostId) -> AppResult<Self> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at ASC, rowid ASC",
            Comment::COLUMNS
        );
        let comments = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![post_id.as_str()], Comment::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut position = HashMap::with_capacity(comments.len());
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, comment) in comments.iter().enumerate() {
            position.insert(comment.id.as_str().to_string(), i);
            if let Some(parent) = &comment.parent_id {
                // Rows arrive oldest first, so sibling lists stay ordered
                children
                    .entry(parent.as_str().to_string())
                    .or_default()
                    .push(i);
            }
        }

        Ok(ThreadIndex {
            comments,
            position,
            children,
        })
    }

    fn replies_of(&self, i: usize) -> &[usize] {
        self.children
            .get(self.comments[i].id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Breadth-first `(index, depth)` pairs of the subtree under `root`, at
    /// most `max_depth` levels below it. Parents precede children.
    fn subtree(&self, root: usize, max_depth: usize) -> Vec<(usize, usize)> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([(root, 0)]);
        while let Some((i, depth)) = queue.pop_front() {
            order.push((i, depth));
            if depth < max_depth {
                queue.extend(self.replies_of(i).iter().map(|&kid| (kid, depth + 1)));
            }
        }
        order
    }

    /// Builds the nested view bottom-up over the breadth-first order, so
    /// thread depth never turns into call-stack depth.
    fn assemble(
        &self,
        conn: &Connection,
        root: usize,
        max_depth: usize,
        counts: &HashMap<String, TargetCounts>,
        authors: &mut Authors,
    ) -> AppResult<CommentView> {
        let order = self.subtree(root, max_depth);
        let mut built: HashMap<usize, CommentView> = HashMap::with_capacity(order.len());

        for &(i, depth) in order.iter().rev() {
            let comment = &self.comments[i];
            let author = authors.get(conn, &comment.author_id)?;
            let node_counts = counts
                .get(comment.id.as_str())
                .copied()
                .unwrap_or_default();
            let mut view = comment_view(comment.clone(), author, node_counts);
            let kids = self.replies_of(i);
            if depth < max_depth {
                view.replies = kids.iter().filter_map(|k| built.remove(k)).collect();
            } else {
                view.has_more_replies = !kids.is_empty();
            }
            built.insert(i, view);
        }

        built
            .remove(&root)
            .ok_or_else(|| AppError::Internal("thread root missing".into()))
    }

    /// Views for several roots sharing one batch of count queries.
    fn threads(
        &self,
        conn: &Connection,
        roots: &[CommentId],
        max_depth: usize,
    ) -> AppResult<Vec<CommentView>> {
        let roots: Vec<usize> = roots
            .iter()
            .map(|id| {
                self.position
                    .get(id.as_str())
                    .copied()
                    .ok_or_else(|| AppError::not_found("Comment", id))
            })
            .collect::<AppResult<_>>()?;

        let mut reachable: Vec<&str> = Vec::new();
        for &root in &roots {
            reachable.extend(
                self.subtree(root, max_depth)
                    .into_iter()
                    .map(|(i, _)| self.comments[i].id.as_str()),
            );
        }
        reachable.sort_unstable();
        reachable.dedup();
        let counts = aggregate::batch_counts(conn, TargetKind::Comment, &reachable)?;

        let mut authors = Authors::default();
        roots
            .into_iter()
            .map(|root| self.assemble(conn, root, max_depth, &counts, &mut authors))
            .collect()
    }
}

fn load_thread(conn: &Connection, id: &CommentId, max_depth: usize) -> AppResult<CommentView> {
    let comment = require_comment(conn, id)?;
    let index = ThreadIndex::load(conn, &comment.post_id)?;
    index
        .threads(conn, std::slice::from_ref(id), max_depth)?
        .pop()
        .ok_or_else(|| AppError::not_found("Comment", id))
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn create_comment(
        &self,
        actor: &UserId,
        post_id: &PostId,
        content: &str,
        parent: Option<&CommentId>,
    ) -> AppResult<CommentView> {
        let content = validate_content(content)?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        require_post(&tx, post_id)?;
        if let Some(parent_id) = parent {
            let parent = require_comment(&tx, parent_id)?;
            if &parent.post_id != post_id {
                return Err(AppError::Validation(
                    "Parent comment belongs to a different post".into(),
                ));
            }
        }

        let id = CommentId::generate();
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id.as_str(),
                post_id.as_str(),
                actor.as_str(),
                parent.map(|p| p.as_str()),
                content,
                now
            ],
        )?;

        let comment = require_comment(&tx, &id)?;
        let author = Authors::default().get(&tx, actor)?;
        let counts = aggregate::counts_for(&tx, &comment)?;
        tx.commit()?;

        tracing::info!("User {} commented {} on post {}", actor, id, post_id);
        Ok(comment_view(comment, author, counts))
    }

    async fn get_thread(&self, id: &CommentId) -> AppResult<CommentView> {
        let conn = self.pool.get()?;
        load_thread(&conn, id, self.max_depth)
    }

    async fn list_comments(
        &self,
        post_id: &PostId,
        author: Option<&UserId>,
        page: PageRequest,
    ) -> AppResult<Page<CommentView>> {
        let window = page.window(&self.pagination)?;
        let conn = self.pool.get()?;
        require_post(&conn, post_id)?;

        let author = author.map(|a| a.as_str());
        let predicate = "post_id = ?1 AND ((?2 IS NULL AND parent_id IS NULL) OR author_id = ?2)";

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM comments WHERE {}", predicate),
            params![post_id.as_str(), author],
            |row| row.get(0),
        )?;

        let roots: Vec<CommentId> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM comments WHERE {} ORDER BY created_at ASC, rowid ASC LIMIT ?3 OFFSET ?4",
                predicate
            ))?;
            let ids = stmt
                .query_map(
                    params![post_id.as_str(), author, window.limit(), window.offset()],
                    |row| row.get::<_, String>(0),
                )?
                .map(|r| r.map(CommentId))
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let index = ThreadIndex::load(&conn, post_id)?;
        Page::new(window, count, index.threads(&conn, &roots, self.max_depth)?)
    }

    async fn update_comment(
        &self,
        actor: &UserId,
        id: &CommentId,
        content: &str,
    ) -> AppResult<CommentView> {
        let content = validate_content(content)?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let comment = require_comment(&tx, id)?;
        authorize(actor, &comment.author_id)?;
        tx.execute(
            "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, now_timestamp(), id.as_str()],
        )?;

        let view = load_thread(&tx, id, self.max_depth)?;
        tx.commit()?;
        Ok(view)
    }

    async fn delete_comment(&self, actor: &UserId, id: &CommentId) -> AppResult<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let comment = require_comment(&tx, id)?;
        authorize(actor, &comment.author_id)?;
        let removed = purge_comments(&tx, id)?;
        tx.commit()?;

        tracing::info!("User {} deleted comment {} ({} removed)", actor, id, removed);
        Ok(removed)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynCommentRepository = Arc<dyn CommentRepository>;
