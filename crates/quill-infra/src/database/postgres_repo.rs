//! PostgreSQL repository implementations.
//!
//! Uniqueness (slugs, emails, usernames, one like per user and target) is
//! enforced by the indexes created in the migration; violations come back
//! as [`RepoError::UniqueViolation`] naming the column. Cascading deletes
//! are foreign-key `ON DELETE CASCADE` rules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DbConn, DbErr, EntityTrait, Order,
    PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError,
    TransactionTrait,
};
use uuid::Uuid;

use quill_core::domain::{
    AuthorSummary, Category, Comment, LikeState, LikeTarget, Page, PageRequest, Post, PostFilter,
    PostStats, SortKey, SortOrder, Tag, User, UserStats,
};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, LikeRepository, PostRepository,
    SlugIndex, TagRepository, UserRepository,
};
use quill_core::services::Repositories;

use super::entity::{category, comment, like, post, post_tag, tag, user};
use super::errors::map_db_err;

/// Every repository backed by the same pool.
pub fn postgres_repositories(db: DbConn) -> Repositories {
    Repositories {
        users: Arc::new(PostgresUserRepository::new(db.clone())),
        posts: Arc::new(PostgresPostRepository::new(db.clone())),
        comments: Arc::new(PostgresCommentRepository::new(db.clone())),
        categories: Arc::new(PostgresCategoryRepository::new(db.clone())),
        tags: Arc::new(PostgresTagRepository::new(db.clone())),
        likes: Arc::new(PostgresLikeRepository::new(db)),
    }
}

macro_rules! postgres_repository {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            pub(crate) db: DbConn,
        }

        impl $name {
            pub fn new(db: DbConn) -> Self {
                Self { db }
            }
        }
    };
}

postgres_repository!(
    /// PostgreSQL user repository.
    PostgresUserRepository
);
postgres_repository!(
    /// PostgreSQL post repository.
    PostgresPostRepository
);
postgres_repository!(
    /// PostgreSQL comment repository.
    PostgresCommentRepository
);
postgres_repository!(
    /// PostgreSQL category repository.
    PostgresCategoryRepository
);
postgres_repository!(PostgresTagRepository);
postgres_repository!(PostgresLikeRepository);

fn sort_order(order: SortOrder) -> Order {
    match order {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}

/// Escape `LIKE` wildcards in user input.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn find_model<E>(db: &DbConn, id: Uuid) -> Result<Option<E::Model>, RepoError>
where
    E: EntityTrait,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = Uuid>,
{
    E::find_by_id(id).one(db).await.map_err(map_db_err)
}

async fn delete_model<E>(db: &DbConn, id: Uuid) -> Result<(), RepoError>
where
    E: EntityTrait,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = Uuid>,
{
    let result = E::delete_by_id(id).exec(db).await.map_err(map_db_err)?;
    if result.rows_affected == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------- users

#[async_trait]
impl BaseRepository<User, Uuid> for PostgresUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        find_model::<user::Entity>(&self.db, id)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert(&self, entity: User) -> Result<User, RepoError> {
        let model = user::ActiveModel::from(entity)
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;
        User::try_from(model)
    }

    async fn update(&self, entity: User) -> Result<User, RepoError> {
        let model = user::ActiveModel::from(entity)
            .update(&self.db)
            .await
            .map_err(map_db_err)?;
        User::try_from(model)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        delete_model::<user::Entity>(&self.db, id).await
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_authors(&self, ids: &[Uuid]) -> Result<Vec<AuthorSummary>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(models
            .into_iter()
            .map(|m| AuthorSummary {
                id: m.id,
                username: m.username,
                display_name: m.display_name,
                avatar: m.avatar,
            })
            .collect())
    }

    async fn list(&self, search: Option<&str>, page: &PageRequest) -> Result<Page<User>, RepoError> {
        let mut query = user::Entity::find();
        if let Some(needle) = search {
            let pattern = like_pattern(&needle.to_lowercase());
            let lower = |column: user::Column| Expr::expr(Func::lower(Expr::col(column)));
            query = query.filter(
                Condition::any()
                    .add(lower(user::Column::Username).like(pattern.clone()))
                    .add(lower(user::Column::DisplayName).like(pattern.clone()))
                    .add(lower(user::Column::Email).like(pattern)),
            );
        }

        let column = match page.sort {
            SortKey::Username => user::Column::Username,
            SortKey::UpdatedAt => user::Column::UpdatedAt,
            _ => user::Column::CreatedAt,
        };
        let paginator = query
            .order_by(column, sort_order(page.order))
            .order_by_asc(user::Column::Id)
            .paginate(&self.db, page.limit);

        let total = paginator.num_items().await.map_err(map_db_err)?;
        let models = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(map_db_err)?;
        let users = models
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(users, total, page))
    }

    async fn stats(
        &self,
        ids: &[Uuid],
        published_posts_only: bool,
    ) -> Result<HashMap<Uuid, UserStats>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut posts = post::Entity::find()
            .select_only()
            .column(post::Column::AuthorId)
            .column_as(Expr::col(post::Column::Id).count(), "total")
            .filter(post::Column::AuthorId.is_in(ids.iter().copied()));
        if published_posts_only {
            posts = posts.filter(post::Column::Published.eq(true));
        }
        let posts: Vec<(Uuid, i64)> = posts
            .group_by(post::Column::AuthorId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        let comments: Vec<(Uuid, i64)> = comment::Entity::find()
            .select_only()
            .column(comment::Column::AuthorId)
            .column_as(Expr::col(comment::Column::Id).count(), "total")
            .filter(comment::Column::AuthorId.is_in(ids.iter().copied()))
            .group_by(comment::Column::AuthorId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        let likes: Vec<(Uuid, i64)> = like::Entity::find()
            .select_only()
            .column(like::Column::UserId)
            .column_as(Expr::col(like::Column::Id).count(), "total")
            .filter(like::Column::UserId.is_in(ids.iter().copied()))
            .group_by(like::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let mut stats: HashMap<Uuid, UserStats> = HashMap::new();
        for (user_id, total) in posts {
            stats.entry(user_id).or_default().posts = u64::try_from(total).unwrap_or_default();
        }
        for (user_id, total) in comments {
            stats.entry(user_id).or_default().comments = u64::try_from(total).unwrap_or_default();
        }
        for (user_id, total) in likes {
            stats.entry(user_id).or_default().likes = u64::try_from(total).unwrap_or_default();
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------- posts

#[async_trait]
impl BaseRepository<Post, Uuid> for PostgresPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(find_model::<post::Entity>(&self.db, id).await?.map(Into::into))
    }

    async fn insert(&self, entity: Post) -> Result<Post, RepoError> {
        let model = post::ActiveModel::from(entity)
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn update(&self, entity: Post) -> Result<Post, RepoError> {
        let mut active = post::ActiveModel::from(entity);
        // The counter is owned by increment_views.
        active.views = ActiveValue::NotSet;
        let model = active.update(&self.db).await.map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        delete_model::<post::Entity>(&self.db, id).await
    }
}

#[async_trait]
impl SlugIndex for PostgresPostRepository {
    async fn slug_exists(&self, slug: &str, exclude_id: Option<Uuid>) -> Result<bool, RepoError> {
        let mut query = post::Entity::find().filter(post::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            query = query.filter(post::Column::Id.ne(id));
        }
        let count = query.count(&self.db).await.map_err(map_db_err)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let model = post::Entity::find()
            .filter(post::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.map(Into::into))
    }

    async fn list(&self, filter: &PostFilter, page: &PageRequest) -> Result<Page<Post>, RepoError> {
        let empty = Page::new(Vec::new(), 0, page);
        let mut query = post::Entity::find();

        if let Some(published) = filter.published {
            query = query.filter(post::Column::Published.eq(published));
        }
        if let Some(featured) = filter.featured {
            query = query.filter(post::Column::Featured.eq(featured));
        }
        if let Some(slug) = filter.category_slug.as_deref() {
            let Some(found) = category::Entity::find()
                .filter(category::Column::Slug.eq(slug))
                .one(&self.db)
                .await
                .map_err(map_db_err)?
            else {
                return Ok(empty);
            };
            query = query.filter(post::Column::CategoryId.eq(found.id));
        }
        if let Some(slug) = filter.tag_slug.as_deref() {
            let Some(found) = tag::Entity::find()
                .filter(tag::Column::Slug.eq(slug))
                .one(&self.db)
                .await
                .map_err(map_db_err)?
            else {
                return Ok(empty);
            };
            query = query.filter(
                post::Column::Id.in_subquery(
                    Query::select()
                        .column(post_tag::Column::PostId)
                        .from(post_tag::Entity)
                        .and_where(post_tag::Column::TagId.eq(found.id))
                        .to_owned(),
                ),
            );
        }
        if let Some(username) = filter.author_username.as_deref() {
            let Some(author) = user::Entity::find()
                .filter(user::Column::Username.eq(username))
                .one(&self.db)
                .await
                .map_err(map_db_err)?
            else {
                return Ok(empty);
            };
            query = query.filter(post::Column::AuthorId.eq(author.id));
        }
        if let Some(needle) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(&needle.to_lowercase());
            let lower = |column: post::Column| Expr::expr(Func::lower(Expr::col(column)));
            query = query.filter(
                Condition::any()
                    .add(lower(post::Column::Title).like(pattern.clone()))
                    .add(lower(post::Column::Content).like(pattern.clone()))
                    .add(lower(post::Column::Excerpt).like(pattern)),
            );
        }

        let column = match page.sort {
            SortKey::UpdatedAt => post::Column::UpdatedAt,
            SortKey::Title => post::Column::Title,
            SortKey::Views => post::Column::Views,
            SortKey::CreatedAt | SortKey::Name | SortKey::Username => post::Column::CreatedAt,
        };
        let paginator = query
            .order_by(column, sort_order(page.order))
            .order_by_asc(post::Column::Id)
            .paginate(&self.db, page.limit);

        let total = paginator.num_items().await.map_err(map_db_err)?;
        let models = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(map_db_err)?;
        Ok(Page::new(
            models.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let result = post::Entity::update_many()
            .col_expr(post::Column::Views, Expr::col(post::Column::Views).add(1))
            .filter(post::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        let views: Option<i64> = post::Entity::find_by_id(id)
            .select_only()
            .column(post::Column::Views)
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        views
            .map(|v| u64::try_from(v).unwrap_or_default())
            .ok_or(RepoError::NotFound)
    }

    async fn stats(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PostStats>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let likes: Vec<(Uuid, i64)> = like::Entity::find()
            .select_only()
            .column(like::Column::PostId)
            .column_as(Expr::col(like::Column::Id).count(), "total")
            .filter(like::Column::PostId.is_in(ids.iter().copied()))
            .group_by(like::Column::PostId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        let comments: Vec<(Uuid, i64)> = comment::Entity::find()
            .select_only()
            .column(comment::Column::PostId)
            .column_as(Expr::col(comment::Column::Id).count(), "total")
            .filter(comment::Column::PostId.is_in(ids.iter().copied()))
            .group_by(comment::Column::PostId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let mut stats: HashMap<Uuid, PostStats> = HashMap::new();
        for (post_id, total) in likes {
            stats.entry(post_id).or_default().likes = u64::try_from(total).unwrap_or_default();
        }
        for (post_id, total) in comments {
            stats.entry(post_id).or_default().comments = u64::try_from(total).unwrap_or_default();
        }
        Ok(stats)
    }
}

// ------------------------------------------------------------- comments

#[async_trait]
impl BaseRepository<Comment, Uuid> for PostgresCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(find_model::<comment::Entity>(&self.db, id)
            .await?
            .map(Into::into))
    }

    async fn insert(&self, entity: Comment) -> Result<Comment, RepoError> {
        let model = comment::ActiveModel::from(entity)
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn update(&self, entity: Comment) -> Result<Comment, RepoError> {
        let model = comment::ActiveModel::from(entity)
            .update(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        delete_model::<comment::Entity>(&self.db, id).await
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Comment>, RepoError> {
        let column = match page.sort {
            SortKey::UpdatedAt => comment::Column::UpdatedAt,
            _ => comment::Column::CreatedAt,
        };
        let paginator = comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::ParentId.is_null())
            .order_by(column, sort_order(page.order))
            .order_by_asc(comment::Column::Id)
            .paginate(&self.db, page.limit);

        let total = paginator.num_items().await.map_err(map_db_err)?;
        let models = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(map_db_err)?;
        Ok(Page::new(
            models.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let models = comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::ParentId.is_not_null())
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}

// ----------------------------------------------------------- categories

#[async_trait]
impl BaseRepository<Category, Uuid> for PostgresCategoryRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        Ok(find_model::<category::Entity>(&self.db, id)
            .await?
            .map(Into::into))
    }

    async fn insert(&self, entity: Category) -> Result<Category, RepoError> {
        let model = category::ActiveModel::from(entity)
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn update(&self, entity: Category) -> Result<Category, RepoError> {
        let model = category::ActiveModel::from(entity)
            .update(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        delete_model::<category::Entity>(&self.db, id).await
    }
}

#[async_trait]
impl SlugIndex for PostgresCategoryRepository {
    async fn slug_exists(&self, slug: &str, exclude_id: Option<Uuid>) -> Result<bool, RepoError> {
        let mut query = category::Entity::find().filter(category::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            query = query.filter(category::Column::Id.ne(id));
        }
        let count = query.count(&self.db).await.map_err(map_db_err)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let model = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.map(Into::into))
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Category>, RepoError> {
        let column = match page.sort {
            SortKey::Name => category::Column::Name,
            SortKey::UpdatedAt => category::Column::UpdatedAt,
            _ => category::Column::CreatedAt,
        };
        let paginator = category::Entity::find()
            .order_by(column, sort_order(page.order))
            .order_by_asc(category::Column::Id)
            .paginate(&self.db, page.limit);

        let total = paginator.num_items().await.map_err(map_db_err)?;
        let models = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(map_db_err)?;
        Ok(Page::new(
            models.into_iter().map(Into::into).collect(),
            total,
            page,
        ))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Category>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = category::Entity::find()
            .filter(category::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn count_posts(&self, category_id: Uuid, published_only: bool) -> Result<u64, RepoError> {
        let mut query = post::Entity::find().filter(post::Column::CategoryId.eq(category_id));
        if published_only {
            query = query.filter(post::Column::Published.eq(true));
        }
        query.count(&self.db).await.map_err(map_db_err)
    }

    async fn count_posts_many(
        &self,
        category_ids: &[Uuid],
        published_only: bool,
    ) -> Result<HashMap<Uuid, u64>, RepoError> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query = post::Entity::find()
            .select_only()
            .column(post::Column::CategoryId)
            .column_as(Expr::col(post::Column::Id).count(), "total")
            .filter(post::Column::CategoryId.is_in(category_ids.iter().copied()));
        if published_only {
            query = query.filter(post::Column::Published.eq(true));
        }
        let rows: Vec<(Uuid, i64)> = query
            .group_by(post::Column::CategoryId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, total)| (id, u64::try_from(total).unwrap_or_default()))
            .collect())
    }
}

// ----------------------------------------------------------------- tags

impl PostgresTagRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let model = tag::Entity::find()
            .filter(tag::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.map(Into::into))
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn upsert_by_slug(&self, name: &str, slug: &str) -> Result<Tag, RepoError> {
        if let Some(found) = self.find_by_slug(slug).await? {
            return Ok(found);
        }

        let active = tag::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
        };
        match active.insert(&self.db).await.map_err(map_db_err) {
            Ok(model) => Ok(model.into()),
            // Created by a concurrent writer since the lookup.
            Err(err) if err.is_unique_violation_on("slug") => {
                self.find_by_slug(slug).await?.ok_or(RepoError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let tag_ids = tag_ids.to_vec();
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    post_tag::Entity::delete_many()
                        .filter(post_tag::Column::PostId.eq(post_id))
                        .exec(txn)
                        .await?;
                    if tag_ids.is_empty() {
                        return Ok(());
                    }
                    let rows = tag_ids
                        .iter()
                        .enumerate()
                        .map(|(position, tag_id)| post_tag::ActiveModel {
                            post_id: Set(post_id),
                            tag_id: Set(*tag_id),
                            position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
                        });
                    post_tag::Entity::insert_many(rows)
                        .exec_without_returning(txn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .map_err(|err| match err {
                TransactionError::Connection(e) | TransactionError::Transaction(e) => map_db_err(e),
            })
    }

    async fn tags_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, RepoError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let links = post_tag::Entity::find()
            .filter(post_tag::Column::PostId.is_in(post_ids.iter().copied()))
            .order_by_asc(post_tag::Column::Position)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        if links.is_empty() {
            return Ok(HashMap::new());
        }

        let tag_ids: Vec<Uuid> = links.iter().map(|link| link.tag_id).collect();
        let tags: HashMap<Uuid, Tag> = tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .all(&self.db)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|model| (model.id, Tag::from(model)))
            .collect();

        let mut by_post: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for link in links {
            if let Some(found) = tags.get(&link.tag_id) {
                by_post.entry(link.post_id).or_default().push(found.clone());
            }
        }
        Ok(by_post)
    }
}

// ---------------------------------------------------------------- likes

#[async_trait]
impl LikeRepository for PostgresLikeRepository {
    async fn toggle(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState, RepoError> {
        let (column, target_id) = like::target_column(target);
        let existing = like::Entity::find()
            .filter(like::Column::UserId.eq(user_id))
            .filter(column.eq(target_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        if let Some(existing) = existing {
            like::Entity::delete_by_id(existing.id)
                .exec(&self.db)
                .await
                .map_err(map_db_err)?;
            return Ok(LikeState { liked: false });
        }

        let (post_id, comment_id) = match target {
            LikeTarget::Post(id) => (Some(id), None),
            LikeTarget::Comment(id) => (None, Some(id)),
        };
        let active = like::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            post_id: Set(post_id),
            comment_id: Set(comment_id),
            created_at: Set(Utc::now().into()),
        };
        match active.insert(&self.db).await.map_err(map_db_err) {
            Ok(_) => Ok(LikeState { liked: true }),
            // A concurrent toggle from the same user already liked it.
            Err(RepoError::UniqueViolation(_)) => Ok(LikeState { liked: true }),
            Err(err) => Err(err),
        }
    }

    async fn count_for_comments(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, i64)> = like::Entity::find()
            .select_only()
            .column(like::Column::CommentId)
            .column_as(Expr::col(like::Column::Id).count(), "total")
            .filter(like::Column::CommentId.is_in(ids.iter().copied()))
            .group_by(like::Column::CommentId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, total)| (id, u64::try_from(total).unwrap_or_default()))
            .collect())
    }
}
