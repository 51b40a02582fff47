use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthorSummary, Category, Comment, LikeState, LikeTarget, Page, PageRequest, Post, PostFilter,
    PostStats, Tag, User, UserStats,
};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Store a new entity. Unique columns that collide yield
    /// [`RepoError::UniqueViolation`].
    async fn insert(&self, entity: T) -> Result<T, RepoError>;

    /// Overwrite an existing entity, with the same unique checks as `insert`.
    async fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID, along with anything that cascades from it.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// Existence check behind slug uniqueness.
#[async_trait]
pub trait SlugIndex: Send + Sync {
    /// Whether `slug` is taken by a record other than `exclude_id`.
    async fn slug_exists(&self, slug: &str, exclude_id: Option<Uuid>) -> Result<bool, RepoError>;
}

/// User repository with lookup by the unique login fields.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Public author fields for the given ids. Unknown ids are skipped.
    async fn find_authors(&self, ids: &[Uuid]) -> Result<Vec<AuthorSummary>, RepoError>;

    /// One page of accounts. `search` matches username, display name or
    /// email, case-insensitively.
    async fn list(&self, search: Option<&str>, page: &PageRequest) -> Result<Page<User>, RepoError>;

    /// Post, comment and like totals per user. Users with none are omitted.
    async fn stats(
        &self,
        ids: &[Uuid],
        published_posts_only: bool,
    ) -> Result<HashMap<Uuid, UserStats>, RepoError>;
}

/// Post repository.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> + SlugIndex {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    async fn list(&self, filter: &PostFilter, page: &PageRequest) -> Result<Page<Post>, RepoError>;

    /// Bump the view counter, returning the new value.
    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError>;

    /// Like and comment totals per post. Posts with neither are omitted.
    async fn stats(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PostStats>, RepoError>;
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// One page of a post's comments that have no parent.
    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Comment>, RepoError>;

    /// Every comment on the post that has a parent.
    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;
}

/// Category repository.
#[async_trait]
pub trait CategoryRepository: BaseRepository<Category, Uuid> + SlugIndex {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError>;

    async fn list(&self, page: &PageRequest) -> Result<Page<Category>, RepoError>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepoError>;

    /// Posts filed under the category, optionally only published ones.
    async fn count_posts(&self, category_id: Uuid, published_only: bool) -> Result<u64, RepoError>;

    /// `count_posts` for several categories at once. Empty categories are
    /// omitted.
    async fn count_posts_many(
        &self,
        category_ids: &[Uuid],
        published_only: bool,
    ) -> Result<HashMap<Uuid, u64>, RepoError>;
}

/// Tag repository. Tags are created on demand and never suffixed.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Return the tag with `slug`, creating it with `name` if absent.
    async fn upsert_by_slug(&self, name: &str, slug: &str) -> Result<Tag, RepoError>;

    /// Replace the post's tag set.
    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;

    async fn tags_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, RepoError>;
}

/// Like repository.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Add the user's like, or remove it if already present.
    async fn toggle(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState, RepoError>;

    async fn count_for_comments(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError>;
}
