//! User directory handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{SortKey, SortOrder};
use quill_shared::ApiResponse;
use quill_shared::dto::UserListQuery;

use super::{page_request, paginated};
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

const DEFAULT_SORT: (SortKey, SortOrder) = (SortKey::CreatedAt, SortOrder::Desc);

/// GET /api/users - Admin only
pub async fn list_users(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<UserListQuery>,
) -> AppResult<HttpResponse> {
    let page = page_request(&query.paging(), DEFAULT_SORT)?;
    let users = state
        .users
        .list(&identity.actor(), query.search.as_deref(), page)
        .await?;
    Ok(HttpResponse::Ok().json(paginated(users)))
}

/// GET /api/users/username/{username}
pub async fn get_user_by_username(
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    let profile = state.users.get_by_username(&username).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(profile)))
}

/// GET /api/users/{id}
pub async fn get_user(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = state.users.get_by_id(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user)))
}

/// PATCH /api/users/{id}/toggle-status - Admin only
pub async fn toggle_user_status(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = state
        .users
        .toggle_status(&identity.actor(), id.into_inner())
        .await?;
    let message = if user.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(user, message)))
}
