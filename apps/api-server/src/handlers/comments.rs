//! Comment handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{NewComment, SortKey, SortOrder};
use quill_shared::ApiResponse;
use quill_shared::dto::{CreateCommentRequest, LikeResponse, ListQuery, UpdateCommentRequest};

use super::{page_request, paginated};
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

const DEFAULT_SORT: (SortKey, SortOrder) = (SortKey::CreatedAt, SortOrder::Desc);

/// POST /api/comments
pub async fn create_comment(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreateCommentRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewComment {
        post_id: req.post_id,
        parent_id: req.parent_id,
        content: req.content,
    };

    let comment = state.comments.create(&identity.actor(), input).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(comment)))
}

/// GET /api/comments/post/{post_id}
///
/// Paginates top-level comments; each carries its full reply list.
pub async fn list_comments(
    state: web::Data<AppState>,
    post_id: web::Path<Uuid>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let page = page_request(&query, DEFAULT_SORT)?;
    let threads = state.comments.list_for_post(post_id.into_inner(), page).await?;
    Ok(HttpResponse::Ok().json(paginated(threads)))
}

/// PUT /api/comments/{id}
pub async fn update_comment(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
    body: web::Json<UpdateCommentRequest>,
) -> AppResult<HttpResponse> {
    let comment = state
        .comments
        .update(&identity.actor(), id.into_inner(), &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(comment)))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.comments.delete(&identity.actor(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message_only("Comment deleted")))
}

/// POST /api/comments/{id}/like
pub async fn toggle_like(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let like = state.comments.toggle_like(&identity.actor(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeResponse { liked: like.liked })))
}
