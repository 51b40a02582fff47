use uuid::Uuid;

use super::{
    Repositories, SlugWrite, hydrate_posts, optional_text, require_text, save_with_unique_slug,
};
use crate::content::{DEFAULT_EXCERPT_LENGTH, extract_excerpt, sanitize};
use crate::domain::{
    Actor, EXCERPT_MAX_CHARS, LikeState, LikeTarget, NewPost, Page, PageRequest, Post, PostFilter,
    PostPatch, PostView, SortKey, TITLE_MAX_CHARS,
};
use crate::error::DomainError;
use crate::slug::{generate_slug, slug_or};

const POST_SORT_KEYS: [SortKey; 4] = [
    SortKey::CreatedAt,
    SortKey::UpdatedAt,
    SortKey::Title,
    SortKey::Views,
];

/// Post authoring and reading.
#[derive(Clone)]
pub struct PostService {
    repos: Repositories,
}

impl PostService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Create a post owned by `actor`.
    ///
    /// The slug comes from the title, the content is sanitized, and the
    /// excerpt is derived from the sanitized content unless supplied.
    pub async fn create(&self, actor: &Actor, input: NewPost) -> Result<PostView, DomainError> {
        let title = require_text("title", &input.title, TITLE_MAX_CHARS)?;
        if input.content.trim().is_empty() {
            return Err(DomainError::validation("content must not be empty"));
        }
        let supplied_excerpt = optional_text("excerpt", input.excerpt, EXCERPT_MAX_CHARS)?;
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let content = sanitize(&input.content);
        let excerpt =
            supplied_excerpt.unwrap_or_else(|| extract_excerpt(&content, DEFAULT_EXCERPT_LENGTH));
        let base = slug_or(&title, "post");

        let mut post = Post::new(actor.user_id, title, String::new(), content, excerpt);
        post.cover_image = input.cover_image.filter(|url| !url.trim().is_empty());
        post.category_id = input.category_id;
        post.published = input.published;

        let tag_ids = self.upsert_tags(&input.tags).await?;
        let post =
            save_with_unique_slug(&*self.repos.posts, post, &base, SlugWrite::Insert).await?;

        // No post outlives a failed tag attach.
        if let Err(err) = self.repos.tags.set_post_tags(post.id, &tag_ids).await {
            tracing::warn!(post_id = %post.id, error = %err, "Tagging failed, removing post");
            if let Err(cleanup) = self.repos.posts.delete(post.id).await {
                tracing::error!(post_id = %post.id, error = %cleanup, "Could not remove untagged post");
            }
            return Err(err.into());
        }

        tracing::info!(post_id = %post.id, slug = %post.slug, "Post created");
        self.view(post).await
    }

    /// List posts. Only admins see drafts; everyone else gets published
    /// posts regardless of the `published` filter.
    pub async fn list(
        &self,
        viewer: Option<&Actor>,
        mut filter: PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostView>, DomainError> {
        page.ensure_sort_in(&POST_SORT_KEYS)?;
        if !viewer.is_some_and(Actor::is_admin) {
            filter.published = Some(true);
        }

        let Page {
            items,
            total,
            page,
            limit,
        } = self.repos.posts.list(&filter, &page).await?;
        let items = self.hydrate(items).await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Fetch a post by slug.
    ///
    /// Drafts are only visible to their author and admins; anyone else gets
    /// `NotFound`. Reading a published post counts a view.
    pub async fn get_by_slug(&self, viewer: Option<&Actor>, slug: &str) -> Result<PostView, DomainError> {
        let mut post = self
            .repos
            .posts
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", slug))?;

        if post.published {
            post.views = self.repos.posts.increment_views(post.id).await?;
        } else if !viewer.is_some_and(|actor| actor.can_modify(post.author_id)) {
            return Err(DomainError::not_found("Post", slug));
        }

        self.view(post).await
    }

    /// Apply a partial update. Only the author or an admin may edit.
    pub async fn update(&self, actor: &Actor, id: Uuid, patch: PostPatch) -> Result<PostView, DomainError> {
        let mut post = self.find(id).await?;
        if !actor.can_modify(post.author_id) {
            return Err(DomainError::Forbidden);
        }

        let mut slug_base = None;
        if let Some(title) = patch.title {
            let title = require_text("title", &title, TITLE_MAX_CHARS)?;
            if title != post.title {
                slug_base = Some(slug_or(&title, "post"));
            }
            post.title = title;
        }

        let supplied_excerpt = match patch.excerpt {
            Some(excerpt) => Some(optional_text("excerpt", Some(excerpt), EXCERPT_MAX_CHARS)?),
            None => None,
        };
        let content_changed = patch.content.is_some();
        if let Some(content) = patch.content {
            if content.trim().is_empty() {
                return Err(DomainError::validation("content must not be empty"));
            }
            post.content = sanitize(&content);
        }
        match supplied_excerpt {
            Some(Some(excerpt)) => post.excerpt = excerpt,
            // Blank excerpt supplied, or new content without one: derive it.
            Some(None) => post.excerpt = extract_excerpt(&post.content, DEFAULT_EXCERPT_LENGTH),
            None if content_changed => {
                post.excerpt = extract_excerpt(&post.content, DEFAULT_EXCERPT_LENGTH);
            }
            None => {}
        }

        if let Some(cover_image) = patch.cover_image {
            post.cover_image = cover_image.filter(|url| !url.trim().is_empty());
        }
        if let Some(category_id) = patch.category_id {
            if let Some(id) = category_id {
                self.ensure_category(id).await?;
            }
            post.category_id = category_id;
        }
        if let Some(published) = patch.published {
            post.published = published;
        }
        post.touch();

        let post = match slug_base {
            Some(base) => {
                save_with_unique_slug(&*self.repos.posts, post, &base, SlugWrite::Update).await?
            }
            None => self.repos.posts.update(post).await?,
        };
        if let Some(tags) = patch.tags {
            self.replace_tags(post.id, &tags).await?;
        }

        tracing::info!(post_id = %post.id, slug = %post.slug, "Post updated");
        self.view(post).await
    }

    /// Delete a post with its comments, likes and tag links.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        let post = self.find(id).await?;
        if !actor.can_modify(post.author_id) {
            return Err(DomainError::Forbidden);
        }
        self.repos.posts.delete(id).await?;
        tracing::info!(post_id = %id, "Post deleted");
        Ok(())
    }

    /// Like or unlike a published post.
    pub async fn toggle_like(&self, actor: &Actor, id: Uuid) -> Result<LikeState, DomainError> {
        let post = self.find(id).await?;
        if !post.published {
            return Err(DomainError::not_found("Post", id));
        }
        Ok(self
            .repos
            .likes
            .toggle(actor.user_id, LikeTarget::Post(id))
            .await?)
    }

    async fn find(&self, id: Uuid) -> Result<Post, DomainError> {
        self.repos
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", id))
    }

    async fn ensure_category(&self, id: Uuid) -> Result<(), DomainError> {
        match self.repos.categories.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("Category", id)),
        }
    }

    /// Upsert tags by slug and make them the post's tag set.
    async fn replace_tags(&self, post_id: Uuid, names: &[String]) -> Result<(), DomainError> {
        let tag_ids = self.upsert_tags(names).await?;
        self.repos.tags.set_post_tags(post_id, &tag_ids).await?;
        Ok(())
    }

    /// Upsert tags by slug, returning their ids in first-seen order. Names
    /// that produce an empty slug are skipped.
    async fn upsert_tags(&self, names: &[String]) -> Result<Vec<Uuid>, DomainError> {
        let mut tag_ids = Vec::new();
        let mut seen = Vec::new();
        for name in names {
            let name = name.trim();
            let slug = generate_slug(name);
            if slug.is_empty() || seen.contains(&slug) {
                continue;
            }
            let tag = self.repos.tags.upsert_by_slug(name, &slug).await?;
            tag_ids.push(tag.id);
            seen.push(slug);
        }
        Ok(tag_ids)
    }

    async fn view(&self, post: Post) -> Result<PostView, DomainError> {
        let mut views = self.hydrate(vec![post]).await?;
        views
            .pop()
            .ok_or_else(|| DomainError::Internal("post vanished while loading".to_string()))
    }

    async fn hydrate(&self, posts: Vec<Post>) -> Result<Vec<PostView>, DomainError> {
        hydrate_posts(&self.repos, posts).await
    }
}
