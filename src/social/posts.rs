// Posts and their tags
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::db::models::Post;
use crate::db::{fold_case, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};
use crate::social::domain::{
    authorize, CommentId, NewPost, PostFilter, PostId, PostUpdate, ReactionKind, UserId,
};
use crate::social::threads::purge_comments;
use crate::social::views::{post_view, post_views, PostView};
use crate::state::DbPool;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, actor: &UserId, input: NewPost) -> AppResult<PostView>;

    async fn get_post(&self, id: &PostId) -> AppResult<PostView>;

    /// Partial update, author only.
    async fn update_post(&self, actor: &UserId, id: &PostId, update: PostUpdate)
        -> AppResult<PostView>;

    /// Author only. Takes the post's comments and every reaction on them with it.
    async fn delete_post(&self, actor: &UserId, id: &PostId) -> AppResult<()>;

    /// Newest first.
    async fn list_posts(&self, filter: PostFilter, page: PageRequest) -> AppResult<Page<PostView>>;
}

pub struct SqlitePostRepository {
    pool: DbPool,
    pagination: PaginationConfig,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool, pagination: PaginationConfig) -> Self {
        Self { pool, pagination }
    }
}

pub(crate) fn find_post(conn: &Connection, id: &PostId) -> AppResult<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS);
    let post = conn
        .query_row(&sql, params![id.as_str()], Post::from_row)
        .optional()?;
    Ok(post)
}

pub(crate) fn require_post(conn: &Connection, id: &PostId) -> AppResult<Post> {
    find_post(conn, id)?.ok_or_else(|| AppError::not_found("Post", id))
}

/// Get-or-create each tag and link it to the post. Runs inside the caller's
/// transaction so tags only persist alongside the post write.
fn attach_tags(conn: &Connection, post_id: &PostId, tags: &[String]) -> AppResult<()> {
    for name in tags {
        conn.execute(
            "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let tag_id: i64 =
            conn.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
                row.get(0)
            })?;
        conn.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
            params![post_id.as_str(), tag_id],
        )?;
    }
    Ok(())
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create_post(&self, actor: &UserId, input: NewPost) -> AppResult<PostView> {
        let input = input.validate()?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(original) = &input.original_post {
            require_post(&tx, original)?;
        }

        let id = PostId::generate();
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO posts (id, author_id, title, content, excerpt, original_post_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id.as_str(),
                actor.as_str(),
                input.title,
                input.content,
                input.excerpt,
                input.original_post.as_ref().map(|p| p.as_str()),
                now
            ],
        )?;
        attach_tags(&tx, &id, &input.tags)?;

        let view = post_view(&tx, require_post(&tx, &id)?)?;
        tx.commit()?;

        tracing::info!("User {} created post {}", actor, id);
        Ok(view)
    }

    async fn get_post(&self, id: &PostId) -> AppResult<PostView> {
        let conn = self.pool.get()?;
        let post = require_post(&conn, id)?;
        post_view(&conn, post)
    }

    async fn update_post(
        &self,
        actor: &UserId,
        id: &PostId,
        update: PostUpdate,
    ) -> AppResult<PostView> {
        let update = update.validate()?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut post = require_post(&tx, id)?;
        authorize(actor, &post.author_id)?;

        if let Some(title) = update.title {
            post.title = title;
        }
        if let Some(content) = update.content {
            post.content = content;
        }
        if let Some(excerpt) = update.excerpt {
            post.excerpt = if excerpt.trim().is_empty() {
                None
            } else {
                Some(excerpt)
            };
        }
        post.updated_at = now_timestamp();

        tx.execute(
            "UPDATE posts SET title = ?1, content = ?2, excerpt = ?3, updated_at = ?4 WHERE id = ?5",
            params![post.title, post.content, post.excerpt, post.updated_at, id.as_str()],
        )?;

        if let Some(tags) = update.tags {
            tx.execute(
                "DELETE FROM post_tags WHERE post_id = ?1",
                params![id.as_str()],
            )?;
            attach_tags(&tx, id, &tags)?;
        }

        let view = post_view(&tx, post)?;
        tx.commit()?;
        Ok(view)
    }

    async fn delete_post(&self, actor: &UserId, id: &PostId) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let post = require_post(&tx, id)?;
        authorize(actor, &post.author_id)?;

        let roots: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT id FROM comments WHERE post_id = ?1 AND parent_id IS NULL")?;
            let ids = stmt
                .query_map(params![id.as_str()], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            ids
        };
        let mut removed_comments = 0;
        for root in roots {
            removed_comments += purge_comments(&tx, &CommentId::new(root))?;
        }

        for kind in ReactionKind::ALL {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE target_kind = 'post' AND target_id = ?1",
                    kind.table()
                ),
                params![id.as_str()],
            )?;
        }
        // Quoting posts survive with original_post_id nulled by the foreign key
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id.as_str()])?;
        tx.commit()?;

        tracing::info!(
            "User {} deleted post {} ({} comments)",
            actor,
            id,
            removed_comments
        );
        Ok(())
    }

    async fn list_posts(&self, filter: PostFilter, page: PageRequest) -> AppResult<Page<PostView>> {
        let window = page.window(&self.pagination)?;
        let conn = self.pool.get()?;

        let author = filter.author.as_ref().map(|a| a.as_str().to_string());
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(fold_case);

        // Literal substring match on Unicode case-folded text, see db::fold_case
        let predicate = "(?1 IS NULL OR author_id = ?1)
             AND (?2 IS NULL OR instr(fold_case(title), ?2) > 0 OR instr(fold_case(content), ?2) > 0)";

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM posts WHERE {}", predicate),
            params![author, search],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM posts WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            Post::COLUMNS,
            predicate
        );
        let posts = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![author, search, window.limit(), window.offset()],
                    Post::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        Page::new(window, count, post_views(&conn, posts)?)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynPostRepository = Arc<dyn PostRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{new_id, test_pool};
    use tempfile::TempDir;

    fn create_test_repo() -> (SqlitePostRepository, DbPool, TempDir) {
        let (pool, tmp) = test_pool();
        let conn = pool.get().unwrap();
        for (id, name) in [("u1", "alice"), ("u2", "bob")] {
            conn.execute(
                "INSERT INTO users (id, username, password_hash, created_at) VALUES (?1, ?2, 'x', ?3)",
                params![id, name, now_timestamp()],
            )
            .unwrap();
        }
        (
            SqlitePostRepository::new(pool.clone(), PaginationConfig::default()),
            pool,
            tmp,
        )
    }

    fn new_post(title: &str, tags: &[&str]) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: format!("Body of {}", title),
            excerpt: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            original_post: None,
        }
    }

    fn alice() -> UserId {
        UserId::new("u1")
    }

    fn bob() -> UserId {
        UserId::new("u2")
    }

    fn count(pool: &DbPool, sql: &str) -> i64 {
        pool.get()
            .unwrap()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn create_post_returns_tags_and_zero_counts() {
        let (repo, _pool, _tmp) = create_test_repo();
        let post = repo
            .create_post(&alice(), new_post("Hello", &["b", "a"]))
            .await
            .unwrap();

        assert_eq!(post.title, "Hello");
        assert_eq!(post.author.username, "alice");
        assert_eq!(post.tag_list, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(post.counts.likes_count, 0);
        assert_eq!(post.counts.comments_count, 0);
        assert!(!post.is_repost);
    }

    #[tokio::test]
    async fn tags_are_shared_between_posts() {
        let (repo, pool, _tmp) = create_test_repo();
        repo.create_post(&alice(), new_post("One", &["rust"]))
            .await
            .unwrap();
        repo.create_post(&bob(), new_post("Two", &["rust", "web"]))
            .await
            .unwrap();

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM tags"), 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM post_tags"), 3);
    }

    #[tokio::test]
    async fn invalid_post_creates_no_tags() {
        let (repo, pool, _tmp) = create_test_repo();
        let input = new_post("  ", &["orphan"]);

        assert!(matches!(
            repo.create_post(&alice(), input).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM tags"), 0);
    }

    #[tokio::test]
    async fn missing_original_rolls_back_everything() {
        let (repo, pool, _tmp) = create_test_repo();
        let mut input = new_post("Quote", &["orphan"]);
        input.original_post = Some(PostId::new("missing"));

        assert!(matches!(
            repo.create_post(&alice(), input).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM posts"), 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM tags"), 0);
    }

    #[tokio::test]
    async fn repost_entity_survives_original_deletion() {
        let (repo, _pool, _tmp) = create_test_repo();
        let original = repo
            .create_post(&alice(), new_post("Original", &[]))
            .await
            .unwrap();

        let mut input = new_post("Quote", &[]);
        input.original_post = Some(original.id.clone());
        let quote = repo.create_post(&bob(), input).await.unwrap();
        assert!(quote.is_repost);
        assert_eq!(quote.original_post, Some(original.id.clone()));

        repo.delete_post(&alice(), &original.id).await.unwrap();

        let quote = repo.get_post(&quote.id).await.unwrap();
        assert_eq!(quote.original_post, None);
        assert!(!quote.is_repost);
    }

    #[tokio::test]
    async fn only_author_can_update_or_delete() {
        let (repo, _pool, _tmp) = create_test_repo();
        let post = repo
            .create_post(&alice(), new_post("Mine", &[]))
            .await
            .unwrap();

        let update = PostUpdate {
            title: Some("Stolen".into()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_post(&bob(), &post.id, update).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            repo.delete_post(&bob(), &post.id).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert_eq!(repo.get_post(&post.id).await.unwrap().title, "Mine");
    }

    #[tokio::test]
    async fn update_replaces_tags_when_given() {
        let (repo, _pool, _tmp) = create_test_repo();
        let post = repo
            .create_post(&alice(), new_post("Tagged", &["a", "b"]))
            .await
            .unwrap();

        let untouched = repo
            .update_post(
                &alice(),
                &post.id,
                PostUpdate {
                    content: Some("New body".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(untouched.tag_list, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(untouched.content, "New body");

        let retagged = repo
            .update_post(
                &alice(),
                &post.id,
                PostUpdate {
                    tags: Some(vec!["c".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(retagged.tag_list, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_comments_and_reactions() {
        let (repo, pool, _tmp) = create_test_repo();
        let post = repo
            .create_post(&alice(), new_post("Doomed", &[]))
            .await
            .unwrap();

        {
            let conn = pool.get().unwrap();
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, updated_at)
                 VALUES ('c1', ?1, 'u2', NULL, 'first', ?2, ?2)",
                params![post.id.as_str(), now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, updated_at)
                 VALUES ('c2', ?1, 'u1', 'c1', 'reply', ?2, ?2)",
                params![post.id.as_str(), now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO likes (id, user_id, target_kind, target_id, created_at) VALUES (?1, 'u2', 'post', ?2, ?3)",
                params![new_id(), post.id.as_str(), now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO bookmarks (id, user_id, target_kind, target_id, created_at) VALUES (?1, 'u1', 'comment', 'c2', ?2)",
                params![new_id(), now],
            )
            .unwrap();
        }

        repo.delete_post(&alice(), &post.id).await.unwrap();

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM posts"), 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments"), 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes"), 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM bookmarks"), 0);
        assert!(matches!(
            repo.get_post(&post.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_author_and_search() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.create_post(&alice(), new_post("Learning Rust", &[]))
            .await
            .unwrap();
        repo.create_post(&alice(), new_post("Cooking", &[]))
            .await
            .unwrap();
        let mut bobs = new_post("Weekend", &[]);
        bobs.content = "Some RUST on the bike chain".into();
        repo.create_post(&bob(), bobs).await.unwrap();

        let by_alice = repo
            .list_posts(
                PostFilter {
                    author: Some(alice()),
                    search: None,
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_alice.count, 2);
        // Newest first
        assert_eq!(by_alice.results[0].title, "Cooking");

        let rust = repo
            .list_posts(
                PostFilter {
                    author: None,
                    search: Some("rust".into()),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        let mut titles: Vec<_> = rust.results.iter().map(|p| p.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Learning Rust", "Weekend"]);
    }

    #[tokio::test]
    async fn search_wildcards_match_literally() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.create_post(&alice(), new_post("100% done", &[]))
            .await
            .unwrap();
        repo.create_post(&alice(), new_post("1000 things", &[]))
            .await
            .unwrap();

        let page = repo
            .list_posts(
                PostFilter {
                    author: None,
                    search: Some("0%".into()),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].title, "100% done");
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.create_post(&alice(), new_post("Éclair recipes", &[]))
            .await
            .unwrap();
        repo.create_post(&alice(), new_post("ÜBER Straße", &[]))
            .await
            .unwrap();
        repo.create_post(&alice(), new_post("Plain", &[]))
            .await
            .unwrap();

        for (query, expected) in [("éclair", "Éclair recipes"), ("ÉCLAIR", "Éclair recipes"), ("über", "ÜBER Straße")] {
            let page = repo
                .list_posts(
                    PostFilter {
                        author: None,
                        search: Some(query.into()),
                    },
                    PageRequest::default(),
                )
                .await
                .unwrap();
            assert_eq!(page.count, 1, "query {}", query);
            assert_eq!(page.results[0].title, expected);
        }
    }

    #[tokio::test]
    async fn page_size_hundred_returns_all_thirty() {
        let (repo, _pool, _tmp) = create_test_repo();
        for i in 0..30 {
            repo.create_post(&alice(), new_post(&format!("Post {}", i), &[]))
                .await
                .unwrap();
        }

        let page = repo
            .list_posts(PostFilter::default(), PageRequest::new(1, 100))
            .await
            .unwrap();
        assert_eq!(page.count, 30);
        assert_eq!(page.results.len(), 30);
        assert_eq!(page.next, None);

        let first = repo
            .list_posts(PostFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(first.results.len(), 10);
        assert_eq!(first.next, Some(2));
    }
}
