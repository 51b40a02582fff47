//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;
pub const BIO_MAX_CHARS: usize = 500;

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ----------------------------------------------------------------- auth

/// Request to register a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl RegisterUserRequest {
    /// Lowercase and trim the login fields.
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_lowercase();
        self.display_name = self.display_name.trim().to_string();
        self.bio = self
            .bio
            .map(|bio| bio.trim().to_string())
            .filter(|bio| !bio.is_empty());
        self
    }

    /// Every rule the request breaks. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let email_ok = match self.email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        };
        if !email_ok {
            errors.push("email must be a valid address".to_string());
        }

        let username_len = self.username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&username_len)
            || !self
                .username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            errors.push(format!(
                "username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} letters, digits or underscores"
            ));
        }

        let display_len = self.display_name.chars().count();
        if display_len == 0 || display_len > DISPLAY_NAME_MAX_CHARS {
            errors.push(format!(
                "display_name must be 1-{DISPLAY_NAME_MAX_CHARS} characters"
            ));
        }

        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push(format!(
                "password must be at least {PASSWORD_MIN_CHARS} characters"
            ));
        }

        if self
            .bio
            .as_ref()
            .is_some_and(|bio| bio.chars().count() > BIO_MAX_CHARS)
        {
            errors.push(format!("bio must be at most {BIO_MAX_CHARS} characters"));
        }

        errors
    }
}

/// Request to login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A user's own account, as returned by register, login and `me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Response containing a token pair and the account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// A fresh token pair issued in exchange for a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserResponse,
}

/// Profile edit. `null` clears `bio` and `avatar`; omitting a field leaves
/// it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
}

/// `GET /api/users` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// Matches username, display name or email.
    pub search: Option<String>,
}

impl UserListQuery {
    pub fn paging(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            limit: self.limit,
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order.clone(),
        }
    }
}

// ---------------------------------------------------------------- posts

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

/// Partial post update. `null` clears `cover_image` and `category_id`;
/// omitting a field leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Pagination and sorting parameters shared by every listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// `GET /api/posts` parameters.
///
/// Paging fields are repeated rather than flattened from [`ListQuery`]:
/// flattening makes query-string numbers arrive as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Tag slug.
    pub tag: Option<String>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    /// Author username.
    pub author: Option<String>,
}

impl PostListQuery {
    pub fn paging(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            limit: self.limit,
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order.clone(),
        }
    }
}

// ------------------------------------------------------------- comments

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

// ----------------------------------------------------------- categories

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

// ---------------------------------------------------------------- likes

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
}
