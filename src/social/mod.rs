pub mod aggregate;
pub mod domain;
pub mod posts;
pub mod reactions;
pub mod threads;
pub mod users;
pub mod views;

pub use domain::{CommentId, PostId, ReactionKind, TargetKind, TargetRef, UserId};
pub use posts::{DynPostRepository, PostRepository, SqlitePostRepository};
pub use reactions::{
    DynReactionRepository, ReactionFilter, ReactionRepository, SqliteReactionRepository,
    ToggleOutcome,
};
pub use threads::{CommentRepository, DynCommentRepository, SqliteCommentRepository};
pub use users::{DynUserRepository, SqliteUserRepository, UserRepository};
