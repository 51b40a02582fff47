//! Post handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{NewPost, PostFilter, PostPatch, SortKey, SortOrder};
use quill_shared::ApiResponse;
use quill_shared::dto::{CreatePostRequest, LikeResponse, PostListQuery, UpdatePostRequest};

use super::{page_request, paginated};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::state::AppState;

const DEFAULT_SORT: (SortKey, SortOrder) = (SortKey::CreatedAt, SortOrder::Desc);

/// GET /api/posts
///
/// Drafts are listed for admins only.
pub async fn list_posts(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    query: web::Query<PostListQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let page = page_request(&query.paging(), DEFAULT_SORT)?;
    let filter = PostFilter {
        search: query.search,
        category_slug: query.category,
        tag_slug: query.tag,
        published: query.published,
        featured: query.featured,
        author_username: query.author,
    };

    let posts = state.posts.list(viewer.actor().as_ref(), filter, page).await?;
    Ok(HttpResponse::Ok().json(paginated(posts)))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewPost {
        title: req.title,
        content: req.content,
        excerpt: req.excerpt,
        cover_image: req.cover_image,
        category_id: req.category_id,
        tags: req.tags,
        published: req.published,
    };

    tracing::debug!(username = %identity.username, "Creating post");
    let post = state.posts.create(&identity.actor(), input).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(post)))
}

/// GET /api/posts/{slug}
pub async fn get_post(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    slug: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = state.posts.get_by_slug(viewer.actor().as_ref(), &slug).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post)))
}

/// PUT /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = PostPatch {
        title: req.title,
        content: req.content,
        excerpt: req.excerpt,
        cover_image: req.cover_image,
        category_id: req.category_id,
        tags: req.tags,
        published: req.published,
    };

    let post = state.posts.update(&identity.actor(), id.into_inner(), patch).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.posts.delete(&identity.actor(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message_only("Post deleted")))
}

/// POST /api/posts/{id}/like
pub async fn toggle_like(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let like = state.posts.toggle_like(&identity.actor(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeResponse { liked: like.liked })))
}
