use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{App, test, web};
use serde_json::{Value, json};

use quill_core::domain::{Role, User};
use quill_core::ports::{PasswordService, TokenService};
use quill_infra::{Argon2PasswordService, JwtConfig, JwtTokenService};

use super::configure_routes;
use crate::observability::RequestIdMiddleware;
use crate::state::AppState;

struct TestContext {
    state: AppState,
    tokens: Arc<dyn TokenService>,
    passwords: Arc<dyn PasswordService>,
}

impl TestContext {
    fn new() -> Self {
        let config = JwtConfig {
            secret: "handler-test-secret".to_string(),
            expiration_hours: 1,
            refresh_expiration_days: 7,
            issuer: "quill-test".to_string(),
        };
        Self {
            state: AppState::in_memory(),
            tokens: Arc::new(JwtTokenService::new(config)),
            passwords: Arc::new(Argon2PasswordService::new()),
        }
    }

    /// Insert a user directly and mint a token for them.
    async fn user(&self, username: &str, role: Role) -> (User, String) {
        let user = User {
            role,
            ..User::new(
                format!("{username}@example.com"),
                username.to_string(),
                username.to_string(),
                "not-a-real-hash".to_string(),
            )
        };
        let user = self.state.repos.users.insert(user).await.unwrap();
        let token = self
            .tokens
            .generate_token(user.id, &user.username, user.role)
            .unwrap();
        (user, token)
    }
}

macro_rules! init_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .app_data(web::Data::new($ctx.state.clone()))
                .app_data(web::Data::new($ctx.tokens.clone()))
                .app_data(web::Data::new($ctx.passwords.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

#[actix_rt::test]
async fn test_health_echoes_request_id() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header(("X-Request-ID", "trace-abc-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "trace-abc-123");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["request_id"], "trace-abc-123");
}

#[actix_rt::test]
async fn test_register_login_and_me() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "Ada@Example.com",
            "username": "Ada",
            "display_name": "Ada Lovelace",
            "password": "analytical engine"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert!(body["data"]["refresh_token"].as_str().is_some());
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");
    assert_eq!(body["data"]["user"]["is_active"], true);
    assert_eq!(body["data"]["user"]["username"], "ada");
    assert_eq!(body["data"]["user"]["role"], "user");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "ADA@example.com", "password": "analytical engine"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["display_name"], "Ada Lovelace");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "ada@example.com", "password": "difference engine"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_register_rejects_invalid_and_duplicate_users() {
    let ctx = TestContext::new();
    ctx.user("grace", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "not-an-email",
            "username": "x",
            "display_name": "X",
            "password": "short"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "grace@example.com",
            "username": "hopper",
            "display_name": "Grace",
            "password": "long enough"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 409);
    assert!(body.get("retryable").is_none());
}

#[actix_rt::test]
async fn test_writes_require_a_bearer_token() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .set_json(json!({"title": "Anonymous", "content": "Nope"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Authentication Required");

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer("garbage"))
        .set_json(json!({"title": "Forged", "content": "Nope"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_create_and_read_post_by_slug() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("ada", Role::User).await;
    let app = init_app!(ctx);

    for expected in ["hello-world", "hello-world-1"] {
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "title": "Hello, World!",
                "content": "<script>alert(1)</script>**Bold** opening words",
                "tags": ["Rust"],
                "published": true
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["slug"], expected);
    }

    let req = test::TestRequest::get()
        .uri("/api/posts/hello-world")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let post = &body["data"];
    assert!(!post["content"].as_str().unwrap().contains("script"));
    assert_eq!(post["excerpt"], "Bold opening words");
    assert_eq!(post["views"], 1);
    assert_eq!(post["author"]["username"], "ada");
    assert_eq!(post["tags"][0]["slug"], "rust");
}

#[actix_rt::test]
async fn test_drafts_hidden_from_strangers() {
    let ctx = TestContext::new();
    let (_, author) = ctx.user("ada", Role::User).await;
    let (_, stranger) = ctx.user("bob", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Work in progress", "content": "Draft"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    for token in [None, Some(stranger.as_str())] {
        let mut req = test::TestRequest::get().uri("/api/posts/work-in-progress");
        if let Some(token) = token {
            req = req.insert_header(bearer(token));
        }
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let req = test::TestRequest::get()
        .uri("/api/posts/work-in-progress")
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 0);
}

#[actix_rt::test]
async fn test_post_listing_pagination_and_bad_params() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("ada", Role::User).await;
    let app = init_app!(ctx);

    for title in ["First", "Second", "Third"] {
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&token))
            .set_json(json!({"title": title, "content": "Body", "published": true}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/posts?limit=2&page=2&sort_by=title&sort_order=asc")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["page"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["title"], "Third");

    let req = test::TestRequest::get().uri("/api/posts?limit=500").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::get().uri("/api/posts?sort_by=name").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::get()
        .uri("/api/posts?page=18446744073709551615&limit=100")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::get().uri("/api/posts?limit=ten").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Bad Request");
}

#[actix_rt::test]
async fn test_only_owner_may_update_post() {
    let ctx = TestContext::new();
    let (_, author) = ctx.user("ada", Role::User).await;
    let (_, stranger) = ctx.user("bob", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Mine", "content": "Body", "published": true}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(bearer(&stranger))
        .set_json(json!({"title": "Yours now"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{id}"))
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Still mine", "cover_image": null}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["slug"], "still-mine");

    let req = test::TestRequest::put()
        .uri("/api/posts/not-a-uuid")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "x"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_comment_threads_and_likes() {
    let ctx = TestContext::new();
    let (_, author) = ctx.user("ada", Role::User).await;
    let (_, reader) = ctx.user("bob", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Discuss", "content": "Body", "published": true}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let post_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/comments")
        .insert_header(bearer(&reader))
        .set_json(json!({"post_id": post_id, "content": "Great post"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let top_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/comments")
        .insert_header(bearer(&author))
        .set_json(json!({"post_id": post_id, "parent_id": top_id, "content": "Thanks!"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/{top_id}/like"))
        .insert_header(bearer(&author))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["liked"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/comments/post/{post_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);
    let thread = &body["data"][0];
    assert_eq!(thread["content"], "Great post");
    assert_eq!(thread["like_count"], 1);
    assert_eq!(thread["replies"][0]["content"], "Thanks!");
    assert_eq!(thread["replies"][0]["author"]["username"], "ada");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/comments/{top_id}"))
        .insert_header(bearer(&author))
        .to_request();
    // Post authors do not own their readers' comments.
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_post_like_toggles() {
    let ctx = TestContext::new();
    let (_, author) = ctx.user("ada", Role::User).await;
    let (_, reader) = ctx.user("bob", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&author))
        .set_json(json!({"title": "Likeable", "content": "Body", "published": true}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    for expected in [true, false] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/posts/{id}/like"))
            .insert_header(bearer(&reader))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["liked"], expected);
    }
}

#[actix_rt::test]
async fn test_category_writes_are_admin_only() {
    let ctx = TestContext::new();
    let (_, user) = ctx.user("bob", Role::User).await;
    let (_, admin) = ctx.user("root", Role::Admin).await;
    let app = init_app!(ctx);

    let payload = json!({"name": "Rust Lang", "color": "#ff6600"});

    let req = test::TestRequest::post()
        .uri("/api/categories")
        .insert_header(bearer(&user))
        .set_json(&payload)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/categories")
        .insert_header(bearer(&admin))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["slug"], "rust-lang");
    assert_eq!(body["data"]["post_count"], 0);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri("/api/categories/rust-lang").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/categories").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/categories/{id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/categories/rust-lang").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_category_detail_lists_recent_published_posts() {
    let ctx = TestContext::new();
    let (_, author) = ctx.user("ada", Role::User).await;
    let (_, admin) = ctx.user("root", Role::Admin).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/categories")
        .insert_header(bearer(&admin))
        .set_json(json!({"name": "Systems"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let category_id = body["data"]["id"].as_str().unwrap().to_string();

    for (title, published) in [("Shipped", true), ("Unfinished", false)] {
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&author))
            .set_json(json!({
                "title": title,
                "content": "Body",
                "category_id": category_id,
                "published": published
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get().uri("/api/categories/systems").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["name"], "Systems");
    assert_eq!(body["data"]["post_count"], 1);
    let recent = body["data"]["recent_posts"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["title"], "Shipped");
    assert_eq!(recent[0]["author"]["username"], "ada");

    let req = test::TestRequest::get().uri("/api/categories").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["post_count"], 1);
    assert!(body["data"][0].get("recent_posts").is_none());
}

#[actix_rt::test]
async fn test_refresh_token_issues_a_new_pair() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "ada@example.com",
            "username": "ada",
            "display_name": "Ada",
            "password": "analytical engine"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": refresh}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["token_type"], "Bearer");
    let renewed = body["data"]["access_token"].as_str().unwrap().to_string();
    assert!(body["data"]["refresh_token"].as_str().is_some());

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&renewed))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // Each token only works in its own slot.
    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": access}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&refresh))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_profile_read_update_and_verify() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("ada", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&token))
        .set_json(json!({"title": "Draft notes", "content": "Body"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["username"], "ada");
    assert_eq!(body["data"]["stats"]["posts"], 1);
    assert!(body["data"].get("password_hash").is_none());

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({
            "display_name": "Ada L.",
            "bio": "Poet of science",
            "avatar": "https://img.example.com/ada.png"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Profile updated");
    assert_eq!(body["data"]["display_name"], "Ada L.");
    assert_eq!(body["data"]["bio"], "Poet of science");

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({"avatar": "not a url"}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({"bio": null}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"]["bio"].is_null());
    assert_eq!(body["data"]["display_name"], "Ada L.");
    assert_eq!(body["data"]["avatar"], "https://img.example.com/ada.png");

    let req = test::TestRequest::get()
        .uri("/api/auth/verify")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["user"]["username"], "ada");

    let req = test::TestRequest::get().uri("/api/auth/verify").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_deactivated_accounts_cannot_sign_in() {
    let ctx = TestContext::new();
    let (admin_user, admin) = ctx.user("root", Role::Admin).await;
    let (_, user) = ctx.user("bob", Role::User).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "eve@example.com",
            "username": "eve",
            "display_name": "Eve",
            "password": "correct horse"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let eve_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();
    let toggle_uri = format!("/api/users/{eve_id}/toggle-status");

    let req = test::TestRequest::patch()
        .uri(&toggle_uri)
        .insert_header(bearer(&user))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&toggle_uri)
        .insert_header(bearer(&admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User deactivated");
    assert_eq!(body["data"]["is_active"], false);

    let login = json!({"email": "eve@example.com", "password": "correct horse"});
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(&login)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": refresh}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/auth/verify")
        .insert_header(bearer(&access))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::patch()
        .uri(&toggle_uri)
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "User activated");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(&login)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/users/{}/toggle-status", admin_user.id))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[actix_rt::test]
async fn test_user_directory_and_public_profiles() {
    let ctx = TestContext::new();
    let (ada, author) = ctx.user("ada", Role::User).await;
    let (_, admin) = ctx.user("root", Role::Admin).await;
    let app = init_app!(ctx);

    for (title, published) in [("Public notes", true), ("Private notes", false)] {
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&author))
            .set_json(json!({"title": title, "content": "Body", "published": published}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/users?sort_by=username&sort_order=asc")
        .insert_header(bearer(&admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["username"], "ada");
    assert_eq!(body["data"][0]["stats"]["posts"], 2);

    let req = test::TestRequest::get()
        .uri("/api/users?search=ROOT")
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["username"], "root");

    let req = test::TestRequest::get().uri("/api/users/username/ADA").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let profile = &body["data"];
    assert_eq!(profile["username"], "ada");
    assert!(profile.get("email").is_none());
    assert_eq!(profile["stats"]["posts"], 1);
    let recent = profile["recent_posts"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["title"], "Public notes");

    let req = test::TestRequest::get().uri("/api/users/username/nobody").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let by_id = format!("/api/users/{}", ada.id);
    let req = test::TestRequest::get().uri(&by_id).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri(&by_id)
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], "ada");
    assert_eq!(body["data"]["stats"]["posts"], 1);
}

#[actix_rt::test]
async fn test_password_helpers_hash_and_verify_on_the_blocking_pool() {
    let passwords: Arc<dyn PasswordService> = Arc::new(Argon2PasswordService::new());

    let hash = super::auth::hash_password(passwords.clone(), "correct horse".to_string())
        .await
        .unwrap();
    assert_ne!(hash, "correct horse");

    let ok = super::auth::verify_password(passwords.clone(), "correct horse".to_string(), hash.clone())
        .await
        .unwrap();
    assert!(ok);
    let wrong = super::auth::verify_password(passwords, "battery staple".to_string(), hash)
        .await
        .unwrap();
    assert!(!wrong);
}
