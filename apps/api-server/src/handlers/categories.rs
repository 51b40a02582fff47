//! Category handlers. Writes are admin-only; the service enforces it.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{CategoryPatch, NewCategory, SortKey, SortOrder};
use quill_shared::ApiResponse;
use quill_shared::dto::{CreateCategoryRequest, ListQuery, UpdateCategoryRequest};

use super::{page_request, paginated};
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

const DEFAULT_SORT: (SortKey, SortOrder) = (SortKey::Name, SortOrder::Asc);

/// GET /api/categories
pub async fn list_categories(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let page = page_request(&query, DEFAULT_SORT)?;
    let categories = state.categories.list(page).await?;
    Ok(HttpResponse::Ok().json(paginated(categories)))
}

/// POST /api/categories
pub async fn create_category(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreateCategoryRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewCategory {
        name: req.name,
        description: req.description,
        color: req.color,
    };

    let category = state.categories.create(&identity.actor(), input).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(category)))
}

/// GET /api/categories/{slug}
pub async fn get_category(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> AppResult<HttpResponse> {
    let category = state.categories.get_by_slug(&slug).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(category)))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
    body: web::Json<UpdateCategoryRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = CategoryPatch {
        name: req.name,
        description: req.description,
        color: req.color,
    };

    let category = state
        .categories
        .update(&identity.actor(), id.into_inner(), patch)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(category)))
}

/// DELETE /api/categories/{id}
pub async fn delete_category(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state.categories.delete(&identity.actor(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message_only("Category deleted")))
}
