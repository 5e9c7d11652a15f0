//! Serializable shapes returned to callers, annotated with aggregate counts.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::models::{Comment, Post, Reaction, User};
use crate::error::{AppError, AppResult};
use crate::social::aggregate::{self, TargetCounts};
use crate::social::domain::{CommentId, PostId, ReactionId, TargetKind, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            bio: user.bio,
            phone_number: user.phone_number,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub author: UserView,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub original_post: Option<PostId>,
    pub is_repost: bool,
    pub tag_list: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub counts: TargetCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post: PostId,
    pub author: UserView,
    pub parent: Option<CommentId>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub counts: TargetCounts,
    pub replies: Vec<CommentView>,
    /// Replies exist below this comment but were cut at the depth limit.
    pub has_more_replies: bool,
}

impl Drop for CommentView {
    // Flatten the tree onto a heap stack so dropping a deep thread stays shallow
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionView {
    pub id: ReactionId,
    pub user: UserView,
    pub content_type: TargetKind,
    pub object_id: String,
    pub created: String,
}

/// Memoizes author lookups while building a batch of views.
#[derive(Default)]
pub struct Authors {
    cache: HashMap<UserId, UserView>,
}

impl Authors {
    pub fn get(&mut self, conn: &Connection, id: &UserId) -> AppResult<UserView> {
        if let Some(view) = self.cache.get(id) {
            return Ok(view.clone());
        }
        let view: UserView = find_user(conn, id)?
            .ok_or_else(|| AppError::not_found("User", id))?
            .into();
        self.cache.insert(id.clone(), view.clone());
        Ok(view)
    }
}

pub fn find_user(conn: &Connection, id: &UserId) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
    let user = conn
        .query_row(&sql, params![id.as_str()], User::from_row)
        .optional()?;
    Ok(user)
}

/// Tag names of a post, alphabetical.
pub fn tag_names(conn: &Connection, post_id: &PostId) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?1
         ORDER BY t.name ASC",
    )?;
    let names = stmt
        .query_map(params![post_id.as_str()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn post_views(conn: &Connection, posts: Vec<Post>) -> AppResult<Vec<PostView>> {
    let mut counts = {
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        aggregate::batch_counts(conn, TargetKind::Post, &ids)?
    };
    let mut authors = Authors::default();

    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let author = authors.get(conn, &post.author_id)?;
        let tag_list = tag_names(conn, &post.id)?;
        let counts = counts.remove(post.id.as_str()).unwrap_or_default();
        views.push(PostView {
            is_repost: post.is_repost(),
            id: post.id,
            author,
            title: post.title,
            content: post.content,
            excerpt: post.excerpt,
            original_post: post.original_post_id,
            tag_list,
            created_at: post.created_at,
            updated_at: post.updated_at,
            counts,
        });
    }
    Ok(views)
}

pub fn post_view(conn: &Connection, post: Post) -> AppResult<PostView> {
    post_views(conn, vec![post])?
        .pop()
        .ok_or_else(|| AppError::Internal("post view missing".into()))
}

/// A comment with its counts but no replies attached yet.
pub fn comment_view(
    comment: Comment,
    author: UserView,
    counts: TargetCounts,
) -> CommentView {
    CommentView {
        id: comment.id,
        post: comment.post_id,
        author,
        parent: comment.parent_id,
        content: comment.content,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        counts,
        replies: Vec::new(),
        has_more_replies: false,
    }
}

pub fn reaction_views(conn: &Connection, reactions: Vec<Reaction>) -> AppResult<Vec<ReactionView>> {
    let mut authors = Authors::default();
    reactions
        .into_iter()
        .map(|reaction| {
            Ok(ReactionView {
                user: authors.get(conn, &reaction.user_id)?,
                id: reaction.id,
                content_type: reaction.target_kind,
                object_id: reaction.target_id,
                created: reaction.created_at,
            })
        })
        .collect()
}
