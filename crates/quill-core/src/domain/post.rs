use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthorSummary, Category, Tag};
use crate::content::ReadingTime;

pub const TITLE_MAX_CHARS: usize = 200;
pub const EXCERPT_MAX_CHARS: usize = 160;

/// Post entity - a blog article addressed by its unique slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post. `slug`, `content` and `excerpt` must already be
    /// resolved and cleaned by the caller.
    pub fn new(author_id: Uuid, title: String, slug: String, content: String, excerpt: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id,
            category_id: None,
            title,
            slug,
            content,
            excerpt,
            cover_image: None,
            published: false,
            featured: false,
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Fields supplied when creating a post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub published: bool,
}

/// Partial update. `None` leaves a field untouched; for the nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

/// Listing filters. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive match against title, content or excerpt.
    pub search: Option<String>,
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    pub author_username: Option<String>,
}

/// Like and comment totals for a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub likes: u64,
    pub comments: u64,
}

/// A post with its author, category, tags and counters, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<AuthorSummary>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    pub stats: PostStats,
    pub reading_time: ReadingTime,
}
