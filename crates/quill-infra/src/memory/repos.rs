use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use quill_core::domain::{
    AuthorSummary, Category, Comment, LikeState, LikeTarget, Page, PageRequest, Post, PostFilter,
    PostStats, SortKey, Tag, User, UserStats,
};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, LikeRepository, PostRepository,
    SlugIndex, TagRepository, UserRepository,
};

use super::{SharedTables, directed};

macro_rules! memory_repository {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            tables: SharedTables,
        }

        impl $name {
            pub(crate) fn new(tables: SharedTables) -> Self {
                Self { tables }
            }
        }
    };
}

memory_repository!(
    /// Users keyed by id, unique on email and username. Both are stored
    /// normalized to lowercase, so comparisons are exact.
    MemoryUserRepository
);
memory_repository!(
    /// Posts keyed by id, unique on slug.
    MemoryPostRepository
);
memory_repository!(MemoryCommentRepository);
memory_repository!(
    /// Categories keyed by id, unique on slug.
    MemoryCategoryRepository
);
memory_repository!(MemoryTagRepository);
memory_repository!(MemoryLikeRepository);

fn duplicate_id(id: Uuid) -> RepoError {
    tracing::debug!(%id, "Rejected insert with an existing id");
    RepoError::UniqueViolation("id".to_string())
}

// ---------------------------------------------------------------- users

#[async_trait]
impl BaseRepository<User, Uuid> for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(duplicate_id(user.id));
        }
        check_user_unique(&tables.users, &user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        check_user_unique(&tables.users, &user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.remove_user(id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

fn check_user_unique(users: &HashMap<Uuid, User>, user: &User) -> Result<(), RepoError> {
    for other in users.values().filter(|u| u.id != user.id) {
        if other.email == user.email {
            return Err(RepoError::UniqueViolation("email".to_string()));
        }
        if other.username == user.username {
            return Err(RepoError::UniqueViolation("username".to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_authors(&self, ids: &[Uuid]) -> Result<Vec<AuthorSummary>, RepoError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(User::summary)
            .collect())
    }

    async fn list(&self, search: Option<&str>, page: &PageRequest) -> Result<Page<User>, RepoError> {
        let tables = self.tables.read().await;
        let needle = search.map(str::to_lowercase);
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| {
                needle.as_deref().is_none_or(|needle| {
                    u.username.contains(needle)
                        || u.email.contains(needle)
                        || u.display_name.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            let primary = match page.sort {
                SortKey::Username => a.username.cmp(&b.username),
                SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            directed(primary, page.order).then_with(|| a.id.cmp(&b.id))
        });
        Ok(Page::from_sorted(users, page))
    }

    async fn stats(
        &self,
        ids: &[Uuid],
        published_posts_only: bool,
    ) -> Result<HashMap<Uuid, UserStats>, RepoError> {
        let tables = self.tables.read().await;
        let mut stats: HashMap<Uuid, UserStats> = HashMap::new();
        for post in tables.posts.values() {
            if ids.contains(&post.author_id) && (post.published || !published_posts_only) {
                stats.entry(post.author_id).or_default().posts += 1;
            }
        }
        for comment in tables.comments.values() {
            if ids.contains(&comment.author_id) {
                stats.entry(comment.author_id).or_default().comments += 1;
            }
        }
        for (user_id, _) in &tables.likes {
            if ids.contains(user_id) {
                stats.entry(*user_id).or_default().likes += 1;
            }
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------- posts

fn check_post_slug(posts: &HashMap<Uuid, Post>, post: &Post) -> Result<(), RepoError> {
    if posts.values().any(|p| p.id != post.id && p.slug == post.slug) {
        return Err(RepoError::UniqueViolation("slug".to_string()));
    }
    Ok(())
}

#[async_trait]
impl BaseRepository<Post, Uuid> for MemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.posts.contains_key(&post.id) {
            return Err(duplicate_id(post.id));
        }
        check_post_slug(&tables.posts, &post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.posts.get(&post.id) else {
            return Err(RepoError::NotFound);
        };
        // The counter is owned by increment_views.
        let post = Post {
            views: stored.views,
            ..post
        };
        check_post_slug(&tables.posts, &post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.remove_post(id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl SlugIndex for MemoryPostRepository {
    async fn slug_exists(&self, slug: &str, exclude_id: Option<Uuid>) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .any(|p| p.slug == slug && Some(p.id) != exclude_id))
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().find(|p| p.slug == slug).cloned())
    }

    async fn list(&self, filter: &PostFilter, page: &PageRequest) -> Result<Page<Post>, RepoError> {
        let tables = self.tables.read().await;
        let empty = || Ok(Page::new(Vec::new(), 0, page));

        let category_id = match filter.category_slug.as_deref() {
            Some(slug) => match tables.categories.values().find(|c| c.slug == slug) {
                Some(category) => Some(category.id),
                None => return empty(),
            },
            None => None,
        };
        let tag_id = match filter.tag_slug.as_deref() {
            Some(slug) => match tables.tags.values().find(|t| t.slug == slug) {
                Some(tag) => Some(tag.id),
                None => return empty(),
            },
            None => None,
        };
        let author_id = match filter.author_username.as_deref() {
            Some(username) => match tables.users.values().find(|u| u.username == username) {
                Some(user) => Some(user.id),
                None => return empty(),
            },
            None => None,
        };
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| filter.published.is_none_or(|published| p.published == published))
            .filter(|p| filter.featured.is_none_or(|featured| p.featured == featured))
            .filter(|p| category_id.is_none_or(|id| p.category_id == Some(id)))
            .filter(|p| author_id.is_none_or(|id| p.author_id == id))
            .filter(|p| {
                tag_id.is_none_or(|id| tables.post_tags.get(&p.id).is_some_and(|ids| ids.contains(&id)))
            })
            .filter(|p| {
                needle.as_deref().is_none_or(|needle| {
                    p.title.to_lowercase().contains(needle)
                        || p.content.to_lowercase().contains(needle)
                        || p.excerpt.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();

        posts.sort_by(|a, b| {
            let primary = match page.sort {
                SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                SortKey::Views => a.views.cmp(&b.views),
                SortKey::CreatedAt | SortKey::Name | SortKey::Username => {
                    a.created_at.cmp(&b.created_at)
                }
            };
            directed(primary, page.order).then_with(|| a.id.cmp(&b.id))
        });
        Ok(Page::from_sorted(posts, page))
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let post = tables.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.views += 1;
        Ok(post.views)
    }

    async fn stats(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PostStats>, RepoError> {
        let tables = self.tables.read().await;
        let mut stats: HashMap<Uuid, PostStats> = HashMap::new();
        for (_, target) in &tables.likes {
            if let LikeTarget::Post(post_id) = target
                && ids.contains(post_id)
            {
                stats.entry(*post_id).or_default().likes += 1;
            }
        }
        for comment in tables.comments.values() {
            if ids.contains(&comment.post_id) {
                stats.entry(comment.post_id).or_default().comments += 1;
            }
        }
        Ok(stats)
    }
}

// ------------------------------------------------------------- comments

#[async_trait]
impl BaseRepository<Comment, Uuid> for MemoryCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn insert(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.comments.contains_key(&comment.id) {
            return Err(duplicate_id(comment.id));
        }
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepoError::Constraint("comment references a missing post".to_string()));
        }
        if let Some(parent_id) = comment.parent_id
            && !tables.comments.contains_key(&parent_id)
        {
            return Err(RepoError::Constraint(
                "comment references a missing parent".to_string(),
            ));
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.comments.contains_key(&comment.id) {
            return Err(RepoError::NotFound);
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables
            .remove_comment_subtree(id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CommentRepository for MemoryCommentRepository {
    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.is_top_level())
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            let primary = match page.sort {
                SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            directed(primary, page.order).then_with(|| a.id.cmp(&b.id))
        });
        Ok(Page::from_sorted(comments, page))
    }

    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut replies: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && !c.is_top_level())
            .cloned()
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(replies)
    }
}

// ----------------------------------------------------------- categories

fn check_category_slug(
    categories: &HashMap<Uuid, Category>,
    category: &Category,
) -> Result<(), RepoError> {
    if categories
        .values()
        .any(|c| c.id != category.id && c.slug == category.slug)
    {
        return Err(RepoError::UniqueViolation("slug".to_string()));
    }
    Ok(())
}

#[async_trait]
impl BaseRepository<Category, Uuid> for MemoryCategoryRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn insert(&self, category: Category) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.categories.contains_key(&category.id) {
            return Err(duplicate_id(category.id));
        }
        check_category_slug(&tables.categories, &category)?;
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update(&self, category: Category) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category.id) {
            return Err(RepoError::NotFound);
        }
        check_category_slug(&tables.categories, &category)?;
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    /// Posts filed under the category are kept and left uncategorized.
    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.categories.remove(&id).ok_or(RepoError::NotFound)?;
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SlugIndex for MemoryCategoryRepository {
    async fn slug_exists(&self, slug: &str, exclude_id: Option<Uuid>) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != exclude_id))
    }
}

#[async_trait]
impl CategoryRepository for MemoryCategoryRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Category>, RepoError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| {
            let primary = match page.sort {
                SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            directed(primary, page.order).then_with(|| a.id.cmp(&b.id))
        });
        Ok(Page::from_sorted(categories, page))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.categories.get(id))
            .cloned()
            .collect())
    }

    async fn count_posts(&self, category_id: Uuid, published_only: bool) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|p| p.category_id == Some(category_id) && (p.published || !published_only))
            .count() as u64)
    }

    async fn count_posts_many(
        &self,
        category_ids: &[Uuid],
        published_only: bool,
    ) -> Result<HashMap<Uuid, u64>, RepoError> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for post in tables.posts.values() {
            if let Some(category_id) = post.category_id
                && category_ids.contains(&category_id)
                && (post.published || !published_only)
            {
                *counts.entry(category_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

// ----------------------------------------------------------------- tags

#[async_trait]
impl TagRepository for MemoryTagRepository {
    async fn upsert_by_slug(&self, name: &str, slug: &str) -> Result<Tag, RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(tag) = tables.tags.values().find(|t| t.slug == slug) {
            return Ok(tag.clone());
        }
        let tag = Tag::new(name.to_string(), slug.to_string());
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post_id) {
            return Err(RepoError::Constraint("tags attached to a missing post".to_string()));
        }
        if tag_ids.is_empty() {
            tables.post_tags.remove(&post_id);
        } else {
            tables.post_tags.insert(post_id, tag_ids.to_vec());
        }
        Ok(())
    }

    async fn tags_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, RepoError> {
        let tables = self.tables.read().await;
        Ok(post_ids
            .iter()
            .filter_map(|post_id| {
                let tag_ids = tables.post_tags.get(post_id)?;
                let tags = tag_ids
                    .iter()
                    .filter_map(|id| tables.tags.get(id))
                    .cloned()
                    .collect();
                Some((*post_id, tags))
            })
            .collect())
    }
}

// ---------------------------------------------------------------- likes

#[async_trait]
impl LikeRepository for MemoryLikeRepository {
    async fn toggle(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState, RepoError> {
        let mut tables = self.tables.write().await;
        let exists = match target {
            LikeTarget::Post(id) => tables.posts.contains_key(&id),
            LikeTarget::Comment(id) => tables.comments.contains_key(&id),
        };
        if !exists {
            return Err(RepoError::Constraint("like references a missing target".to_string()));
        }

        let key = (user_id, target);
        let liked = if tables.likes.remove(&key) {
            false
        } else {
            tables.likes.insert(key);
            true
        };
        Ok(LikeState { liked })
    }

    async fn count_for_comments(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for (_, target) in &tables.likes {
            if let LikeTarget::Comment(id) = target
                && ids.contains(id)
            {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
