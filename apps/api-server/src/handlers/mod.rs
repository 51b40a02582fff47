//! HTTP handlers and route configuration.

mod auth;
mod categories;
mod comments;
mod health;
mod posts;
mod users;

#[cfg(test)]
mod tests;

use actix_web::{HttpRequest, web};

use quill_core::domain::{Page, PageRequest, SortKey, SortOrder};
use quill_shared::PaginatedResponse;
use quill_shared::dto::ListQuery;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    }))
    .service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Auth routes
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh))
                    .route("/me", web::get().to(auth::me))
                    .route("/profile", web::get().to(auth::get_profile))
                    .route("/profile", web::put().to(auth::update_profile))
                    .route("/verify", web::get().to(auth::verify)),
            )
            .service(
                web::scope("/users")
                    .route("", web::get().to(users::list_users))
                    .route("/username/{username}", web::get().to(users::get_user_by_username))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}/toggle-status", web::patch().to(users::toggle_user_status)),
            )
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    .route("/{id}/like", web::post().to(posts::toggle_like))
                    .route("/{slug}", web::get().to(posts::get_post))
                    .route("/{id}", web::put().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post)),
            )
            .service(
                web::scope("/comments")
                    .route("", web::post().to(comments::create_comment))
                    .route("/post/{post_id}", web::get().to(comments::list_comments))
                    .route("/{id}/like", web::post().to(comments::toggle_like))
                    .route("/{id}", web::put().to(comments::update_comment))
                    .route("/{id}", web::delete().to(comments::delete_comment)),
            )
            .service(
                web::scope("/categories")
                    .route("", web::get().to(categories::list_categories))
                    .route("", web::post().to(categories::create_category))
                    .route("/{slug}", web::get().to(categories::get_category))
                    .route("/{id}", web::put().to(categories::update_category))
                    .route("/{id}", web::delete().to(categories::delete_category)),
            ),
    );
}

/// Validate paging parameters against a listing's default sort.
fn page_request(query: &ListQuery, default_sort: (SortKey, SortOrder)) -> Result<PageRequest, AppError> {
    Ok(PageRequest::from_params(
        query.page,
        query.limit,
        query.sort_by.as_deref(),
        query.sort_order.as_deref(),
        default_sort,
    )?)
}

fn paginated<T>(page: Page<T>) -> PaginatedResponse<T> {
    PaginatedResponse::new(page.items, page.total, page.page, page.limit)
}
