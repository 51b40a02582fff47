use uuid::Uuid;

use super::{
    Repositories, SlugWrite, latest_published, optional_text, require_admin, require_text,
    save_with_unique_slug,
};
use crate::domain::{
    Actor, CATEGORY_DESCRIPTION_MAX_CHARS, CATEGORY_NAME_MAX_CHARS, Category, CategoryDetail,
    CategoryPatch, CategoryView, NewCategory, Page, PageRequest, PostFilter, RECENT_CATEGORY_POSTS,
    SortKey, is_hex_color,
};
use crate::error::DomainError;
use crate::slug::slug_or;

const CATEGORY_SORT_KEYS: [SortKey; 2] = [SortKey::Name, SortKey::CreatedAt];

/// Category management. Writes are admin-only.
#[derive(Clone)]
pub struct CategoryService {
    repos: Repositories,
}

impl CategoryService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create(&self, actor: &Actor, input: NewCategory) -> Result<CategoryView, DomainError> {
        require_admin(actor)?;
        let name = require_text("name", &input.name, CATEGORY_NAME_MAX_CHARS)?;
        let description =
            optional_text("description", input.description, CATEGORY_DESCRIPTION_MAX_CHARS)?;
        let color = checked_color(input.color)?;

        let mut category = Category::new(name, String::new());
        category.description = description;
        category.color = color;

        let base = slug_or(&category.name, "category");
        let category =
            save_with_unique_slug(&*self.repos.categories, category, &base, SlugWrite::Insert)
                .await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
        self.view(category).await
    }

    /// Categories with their published post counts. Sorted by name unless
    /// the request says otherwise.
    pub async fn list(&self, page: PageRequest) -> Result<Page<CategoryView>, DomainError> {
        page.ensure_sort_in(&CATEGORY_SORT_KEYS)?;
        let categories = self.repos.categories.list(&page).await?;

        let ids: Vec<Uuid> = categories.items.iter().map(|c| c.id).collect();
        let counts = self.repos.categories.count_posts_many(&ids, true).await?;
        Ok(categories.map(|category| CategoryView {
            post_count: counts.get(&category.id).copied().unwrap_or_default(),
            category,
        }))
    }

    /// A category with its newest published posts.
    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryDetail, DomainError> {
        let category = self
            .repos
            .categories
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", slug))?;

        let filter = PostFilter {
            category_slug: Some(category.slug.clone()),
            ..Default::default()
        };
        let recent_posts = latest_published(&self.repos, filter, RECENT_CATEGORY_POSTS).await?;
        Ok(CategoryDetail {
            category: self.view(category).await?,
            recent_posts,
        })
    }

    /// Renaming regenerates the slug.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<CategoryView, DomainError> {
        require_admin(actor)?;
        let mut category = self.find(id).await?;

        let mut slug_base = None;
        if let Some(name) = patch.name {
            let name = require_text("name", &name, CATEGORY_NAME_MAX_CHARS)?;
            if name != category.name {
                slug_base = Some(slug_or(&name, "category"));
            }
            category.name = name;
        }
        if let Some(description) = patch.description {
            category.description =
                optional_text("description", description, CATEGORY_DESCRIPTION_MAX_CHARS)?;
        }
        if let Some(color) = patch.color {
            category.color = checked_color(color)?;
        }
        category.updated_at = chrono::Utc::now();

        let category = match slug_base {
            Some(base) => {
                save_with_unique_slug(&*self.repos.categories, category, &base, SlugWrite::Update)
                    .await?
            }
            None => self.repos.categories.update(category).await?,
        };

        tracing::info!(category_id = %category.id, slug = %category.slug, "Category updated");
        self.view(category).await
    }

    /// Delete an empty category. Categories that still hold posts, drafts
    /// included, are refused.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        require_admin(actor)?;
        self.find(id).await?;

        let posts = self.repos.categories.count_posts(id, false).await?;
        if posts > 0 {
            return Err(DomainError::validation(format!(
                "category still has {posts} post(s)"
            )));
        }
        self.repos.categories.delete(id).await?;
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Category, DomainError> {
        self.repos
            .categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))
    }

    async fn view(&self, category: Category) -> Result<CategoryView, DomainError> {
        let post_count = self.repos.categories.count_posts(category.id, true).await?;
        Ok(CategoryView {
            category,
            post_count,
        })
    }
}

fn checked_color(color: Option<String>) -> Result<Option<String>, DomainError> {
    match optional_text("color", color, 7)? {
        Some(color) if !is_hex_color(&color) => Err(DomainError::validation(format!(
            "color must be a hex value like #3b82f6, got '{color}'"
        ))),
        other => Ok(other),
    }
}
