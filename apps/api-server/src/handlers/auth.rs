//! Authentication handlers.

use actix_web::{HttpResponse, web};
use std::sync::Arc;

use quill_core::domain::{ProfilePatch, User};
use quill_core::ports::{PasswordService, TokenService};
use quill_shared::ApiResponse;
use quill_shared::dto::{
    AuthResponse, LoginRequest, RefreshTokenRequest, RegisterUserRequest, TokenResponse,
    UpdateProfileRequest, UserResponse, VerifyResponse,
};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        bio: user.bio.clone(),
        avatar: user.avatar.clone(),
        role: user.role.to_string(),
        is_active: user.is_active,
        created_at: user.created_at,
    }
}

fn token_pair(token_service: &dyn TokenService, user: &User) -> AppResult<TokenResponse> {
    Ok(TokenResponse {
        access_token: token_service.generate_token(user.id, &user.username, user.role)?,
        refresh_token: token_service.generate_refresh_token(user.id, &user.username, user.role)?,
        token_type: "Bearer".to_string(),
        expires_in: token_service.expiration_seconds().max(0) as u64,
    })
}

fn auth_response(token_service: &dyn TokenService, user: &User) -> AppResult<AuthResponse> {
    let tokens = token_pair(token_service, user)?;

    Ok(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
        user: user_response(user),
    })
}

/// Argon2 work runs on the blocking thread pool.
pub(super) async fn hash_password(
    passwords: Arc<dyn PasswordService>,
    password: String,
) -> AppResult<String> {
    Ok(web::block(move || passwords.hash(&password)).await??)
}

pub(super) async fn verify_password(
    passwords: Arc<dyn PasswordService>,
    password: String,
    hash: String,
) -> AppResult<bool> {
    Ok(web::block(move || passwords.verify(&password, &hash)).await??)
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    token_service: web::Data<Arc<dyn TokenService>>,
    password_service: web::Data<Arc<dyn PasswordService>>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner().normalized();

    let errors = req.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if state.repos.users.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::conflict("Email already registered"));
    }
    if state.repos.users.find_by_username(&req.username).await?.is_some() {
        return Err(AppError::conflict("Username already taken"));
    }

    let password_hash = hash_password(password_service.get_ref().clone(), req.password).await?;

    // A concurrent registration can still win the unique index; the repo
    // error maps to 409.
    let user = User::new(req.email, req.username, req.display_name, password_hash).with_bio(req.bio);
    let user = state.repos.users.insert(user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let response = auth_response(token_service.get_ref().as_ref(), &user)?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(response)))
}

/// POST /api/auth/login
///
/// Unknown emails, wrong passwords and deactivated accounts all get the
/// same 401.
pub async fn login(
    state: web::Data<AppState>,
    token_service: web::Data<Arc<dyn TokenService>>,
    password_service: web::Data<Arc<dyn PasswordService>>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let user = state.users.find_active_by_email(&req.email).await?;

    let matches = verify_password(
        password_service.get_ref().clone(),
        req.password,
        user.password_hash.clone(),
    )
    .await?;
    if !matches {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AppError::Unauthorized);
    }

    let response = auth_response(token_service.get_ref().as_ref(), &user)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// POST /api/auth/refresh
///
/// Exchanges a refresh token for a new pair. The account must still exist
/// and be active; role changes since the last login take effect here.
pub async fn refresh(
    state: web::Data<AppState>,
    token_service: web::Data<Arc<dyn TokenService>>,
    body: web::Json<RefreshTokenRequest>,
) -> AppResult<HttpResponse> {
    let claims = token_service.validate_refresh_token(body.refresh_token.trim())?;
    let user = state.users.find_active(claims.user_id).await?;

    tracing::debug!(user_id = %user.id, "Tokens refreshed");
    let response = token_pair(token_service.get_ref().as_ref(), &user)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// GET /api/auth/me - Protected route
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state
        .repos
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account no longer exists".to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(user_response(&user))))
}

/// GET /api/auth/profile
pub async fn get_profile(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let profile = state.users.profile(&identity.actor()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(profile)))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = ProfilePatch {
        display_name: req.display_name,
        bio: req.bio,
        avatar: req.avatar,
    };

    let profile = state.users.update_profile(&identity.actor(), patch).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(profile, "Profile updated")))
}

/// GET /api/auth/verify
pub async fn verify(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state.users.find_active(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(VerifyResponse {
        valid: true,
        user: user_response(&user),
    })))
}
