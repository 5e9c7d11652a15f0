use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::social::domain::{CommentId, PostId, Reactable, ReactionId, TargetKind, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, username, email, full_name, bio, phone_number, avatar_url, password_hash, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: UserId(row.get(0)?),
            username: row.get(1)?,
            email: row.get(2)?,
            full_name: row.get(3)?,
            bio: row.get(4)?,
            phone_number: row.get(5)?,
            avatar_url: row.get(6)?,
            password_hash: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub original_post_id: Option<PostId>,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub const COLUMNS: &'static str =
        "id, author_id, title, content, excerpt, original_post_id, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Post {
            id: PostId(row.get(0)?),
            author_id: UserId(row.get(1)?),
            title: row.get(2)?,
            content: row.get(3)?,
            excerpt: row.get(4)?,
            original_post_id: row.get::<_, Option<String>>(5)?.map(PostId),
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub fn is_repost(&self) -> bool {
        self.original_post_id.is_some()
    }
}

impl Reactable for Post {
    fn kind(&self) -> TargetKind {
        TargetKind::Post
    }

    fn target_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Comment {
    pub const COLUMNS: &'static str =
        "id, post_id, author_id, parent_id, content, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: CommentId(row.get(0)?),
            post_id: PostId(row.get(1)?),
            author_id: UserId(row.get(2)?),
            parent_id: row.get::<_, Option<String>>(3)?.map(CommentId),
            content: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl Reactable for Comment {
    fn kind(&self) -> TargetKind {
        TargetKind::Comment
    }

    fn target_id(&self) -> &str {
        self.id.as_str()
    }
}

/// One row of `likes`, `bookmarks` or `reposts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub user_id: UserId,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub created_at: String,
}

impl Reaction {
    pub const COLUMNS: &'static str = "id, user_id, target_kind, target_id, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(2)?;
        let target_kind = kind.parse::<TargetKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;

        Ok(Reaction {
            id: ReactionId(row.get(0)?),
            user_id: UserId(row.get(1)?),
            target_kind,
            target_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl Reactable for Reaction {
    fn kind(&self) -> TargetKind {
        self.target_kind
    }

    fn target_id(&self) -> &str {
        &self.target_id
    }
}
