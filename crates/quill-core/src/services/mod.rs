//! Services - the operations the API exposes, written against the ports.

mod category;
mod comment;
mod post;
mod user;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::content::reading_time;
use crate::domain::{
    Actor, AuthorSummary, Category, Page, PageRequest, Post, PostFilter, PostView, SortKey, SortOrder,
};
use crate::error::DomainError;
use crate::ports::{
    BaseRepository, CategoryRepository, CommentRepository, LikeRepository, PostRepository,
    SlugIndex, TagRepository, UserRepository,
};
use crate::slug::resolve_unique_slug_in;

pub use category::CategoryService;
pub use comment::CommentService;
pub use post::PostService;
pub use user::UserService;

/// Attempts at claiming a slug before reporting a conflict.
pub const MAX_SLUG_ATTEMPTS: usize = 3;

/// The full set of repositories a service may need.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub likes: Arc<dyn LikeRepository>,
}

/// Records whose slug is allocated by [`save_with_unique_slug`].
pub(crate) trait Slugged: Clone + Send + Sync {
    fn record_id(&self) -> Uuid;
    fn set_slug(&mut self, slug: String);
}

impl Slugged for Post {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

impl Slugged for Category {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlugWrite {
    Insert,
    Update,
}

/// Resolve a free slug from `base`, then write the record.
///
/// The existence check and the write are not atomic. When the store's unique
/// index rejects the slug, the slug is resolved again and the write retried,
/// up to [`MAX_SLUG_ATTEMPTS`] times.
pub(crate) async fn save_with_unique_slug<T, R>(
    repo: &R,
    mut record: T,
    base: &str,
    write: SlugWrite,
) -> Result<T, DomainError>
where
    T: Slugged + 'static,
    R: BaseRepository<T, Uuid> + SlugIndex + ?Sized,
{
    let exclude_id = match write {
        SlugWrite::Insert => None,
        SlugWrite::Update => Some(record.record_id()),
    };

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = resolve_unique_slug_in(repo, base, exclude_id).await?;
        record.set_slug(slug.clone());

        let result = match write {
            SlugWrite::Insert => repo.insert(record.clone()).await,
            SlugWrite::Update => repo.update(record.clone()).await,
        };

        match result {
            Ok(saved) => return Ok(saved),
            Err(err) if err.is_unique_violation_on("slug") => {
                tracing::warn!(slug = %slug, attempt, "Slug claimed concurrently, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(DomainError::Conflict(format!(
        "could not reserve a slug for '{base}', please try again"
    )))
}

/// Attach authors, categories, tags and counters in batched lookups.
pub(crate) async fn hydrate_posts(
    repos: &Repositories,
    posts: Vec<Post>,
) -> Result<Vec<PostView>, DomainError> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let author_ids = distinct(posts.iter().map(|p| p.author_id));
    let category_ids = distinct(posts.iter().filter_map(|p| p.category_id));

    let authors: HashMap<Uuid, AuthorSummary> = repos
        .users
        .find_authors(&author_ids)
        .await?
        .into_iter()
        .map(|author| (author.id, author))
        .collect();
    let categories: HashMap<Uuid, Category> = repos
        .categories
        .find_many(&category_ids)
        .await?
        .into_iter()
        .map(|category| (category.id, category))
        .collect();
    let mut tags = repos.tags.tags_for_posts(&ids).await?;
    let stats = repos.posts.stats(&ids).await?;

    Ok(posts
        .into_iter()
        .map(|post| PostView {
            author: authors.get(&post.author_id).cloned(),
            category: post.category_id.and_then(|id| categories.get(&id).cloned()),
            tags: tags.remove(&post.id).unwrap_or_default(),
            stats: stats.get(&post.id).copied().unwrap_or_default(),
            reading_time: reading_time(&post.content),
            post,
        })
        .collect())
}

/// The newest `limit` published posts matching `filter`, hydrated.
pub(crate) async fn latest_published(
    repos: &Repositories,
    mut filter: PostFilter,
    limit: u64,
) -> Result<Vec<PostView>, DomainError> {
    filter.published = Some(true);
    let page = PageRequest::new(1, limit, SortKey::CreatedAt, SortOrder::Desc)?;
    let Page { items, .. } = repos.posts.list(&filter, &page).await?;
    hydrate_posts(repos, items).await
}

/// Fail with `Forbidden` unless the caller is an admin.
pub(crate) fn require_admin(actor: &Actor) -> Result<(), DomainError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden)
    }
}

/// Trim `value` and require 1..=`max_chars` characters.
pub(crate) fn require_text(field: &str, value: &str, max_chars: usize) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional value; blank becomes `None`. Enforces `max_chars`.
pub(crate) fn optional_text(
    field: &str,
    value: Option<String>,
    max_chars: usize,
) -> Result<Option<String>, DomainError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => require_text(field, text, max_chars).map(Some),
    }
}

/// Distinct values in first-seen order.
pub(crate) fn distinct<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  hi  ", 10).unwrap(), "hi");
        assert!(require_text("title", "   ", 10).is_err());
        assert!(require_text("title", "abcdef", 5).is_err());
        assert!(require_text("title", "ééééé", 5).is_ok());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("bio", None, 5).unwrap(), None);
        assert_eq!(optional_text("bio", Some("  ".into()), 5).unwrap(), None);
        assert_eq!(optional_text("bio", Some(" ok ".into()), 5).unwrap(), Some("ok".into()));
        assert!(optional_text("bio", Some("too long".into()), 5).is_err());
    }

    #[test]
    fn test_distinct() {
        assert_eq!(distinct([3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
