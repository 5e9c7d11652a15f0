// Domain types - pure, no storage access
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(crate::db::new_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(UserId);
string_id!(PostId);
string_id!(CommentId);
string_id!(
    /// Identifier of a single like, bookmark or repost record.
    ReactionId
);

/// The kinds of entity a reaction or comment can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    /// Value stored in the `target_kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Post => "post",
            TargetKind::Comment => "comment",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetKind::Post),
            "comment" => Ok(TargetKind::Comment),
            other => Err(AppError::Validation(format!(
                "Unknown target type '{}', expected 'post' or 'comment'",
                other
            ))),
        }
    }
}

/// A reference to something that can be reacted to. Reactions store this as
/// a `(target_kind, target_id)` pair rather than a typed foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Post(PostId),
    Comment(CommentId),
}

impl TargetRef {
    pub fn from_parts(kind: TargetKind, id: impl Into<String>) -> Self {
        match kind {
            TargetKind::Post => TargetRef::Post(PostId::new(id)),
            TargetKind::Comment => TargetRef::Comment(CommentId::new(id)),
        }
    }
}

/// Anything addressable by a reaction.
pub trait Reactable {
    fn kind(&self) -> TargetKind;
    fn target_id(&self) -> &str;

    fn target_ref(&self) -> TargetRef {
        TargetRef::from_parts(self.kind(), self.target_id())
    }
}

impl Reactable for TargetRef {
    fn kind(&self) -> TargetKind {
        match self {
            TargetRef::Post(_) => TargetKind::Post,
            TargetRef::Comment(_) => TargetKind::Comment,
        }
    }

    fn target_id(&self) -> &str {
        match self {
            TargetRef::Post(id) => id.as_str(),
            TargetRef::Comment(id) => id.as_str(),
        }
    }

    fn target_ref(&self) -> TargetRef {
        self.clone()
    }
}

impl Reactable for PostId {
    fn kind(&self) -> TargetKind {
        TargetKind::Post
    }

    fn target_id(&self) -> &str {
        self.as_str()
    }
}

impl Reactable for CommentId {
    fn kind(&self) -> TargetKind {
        TargetKind::Comment
    }

    fn target_id(&self) -> &str {
        self.as_str()
    }
}

/// The three structurally identical reaction families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Bookmark,
    Repost,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 3] = [ReactionKind::Like, ReactionKind::Bookmark, ReactionKind::Repost];

    /// Backing table. Only ever one of three literals, safe to splice into SQL.
    pub fn table(&self) -> &'static str {
        match self {
            ReactionKind::Like => "likes",
            ReactionKind::Bookmark => "bookmarks",
            ReactionKind::Repost => "reposts",
        }
    }

    /// Message reported when a post toggle removes the record.
    pub fn removed_message(&self) -> &'static str {
        match self {
            ReactionKind::Like => "Unliked",
            ReactionKind::Bookmark => "Bookmark removed",
            ReactionKind::Repost => "Repost removed",
        }
    }

    /// Message reported when a comment already carries this reaction.
    pub fn duplicate_message(&self) -> &'static str {
        match self {
            ReactionKind::Like => "Already liked",
            ReactionKind::Bookmark => "Already bookmarked",
            ReactionKind::Repost => "Already reposted",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReactionKind::Like => "like",
            ReactionKind::Bookmark => "bookmark",
            ReactionKind::Repost => "repost",
        };
        f.write_str(name)
    }
}

/// Ownership check for mutating actions.
pub fn authorize(actor: &UserId, owner: &UserId) -> AppResult<()> {
    if actor == owner {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("Not allowed".into()))
    }
}

// --- Inputs ---

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub original_post: Option<PostId>,
}

impl NewPost {
    /// Validates and normalises in place, before any write happens.
    pub fn validate(mut self) -> AppResult<Self> {
        self.title = validate_title(&self.title)?;
        self.content = validate_content(&self.content)?;
        self.excerpt = normalize_optional(self.excerpt);
        self.tags = normalize_tags(&self.tags)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// An empty string clears the excerpt.
    pub excerpt: Option<String>,
    /// When present, replaces the post's whole tag set.
    pub tags: Option<Vec<String>>,
}

impl PostUpdate {
    pub fn validate(mut self) -> AppResult<Self> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(content) = &self.content {
            self.content = Some(validate_content(content)?);
        }
        if let Some(tags) = &self.tags {
            self.tags = Some(normalize_tags(tags)?);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub author: Option<UserId>,
    pub search: Option<String>,
}

pub fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

pub fn validate_content(content: &str) -> AppResult<String> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Content is required".into()));
    }
    Ok(content.to_string())
}

/// Trims, drops duplicates (first occurrence wins) and enforces the name length.
pub fn normalize_tags(tags: &[String]) -> AppResult<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(tags.len());
    for raw in tags {
        let name = raw.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Tag names cannot be empty".into()));
        }
        if name.chars().count() > MAX_TAG_LEN {
            return Err(AppError::Validation(format!(
                "Tag '{}' must be {} characters or less",
                name, MAX_TAG_LEN
            )));
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| if v.trim().is_empty() { None } else { Some(v) })
}
