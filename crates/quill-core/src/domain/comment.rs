use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthorSummary;

pub const COMMENT_MAX_CHARS: usize = 1000;

/// Comment entity. `parent_id` points at another comment on the same post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, author_id: Uuid, parent_id: Option<Uuid>, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            parent_id,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields supplied when creating a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

/// A comment with denormalized author and like count.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
    pub like_count: u64,
}
