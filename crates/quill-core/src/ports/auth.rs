//! Authentication and authorization ports.

use uuid::Uuid;

use crate::domain::{Actor, Role};

/// Claims stored in access tokens.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: i64,
}

impl TokenClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// Token service trait for JWT operations.
///
/// Access and refresh tokens are not interchangeable: each validator
/// rejects the other kind.
pub trait TokenService: Send + Sync {
    /// Generate an access token for a user.
    fn generate_token(&self, user_id: Uuid, username: &str, role: Role) -> Result<String, AuthError>;

    /// Validate and decode an access token.
    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    /// Lifetime of freshly issued access tokens.
    fn expiration_seconds(&self) -> i64;

    /// Generate a long-lived token that can only be exchanged for new tokens.
    fn generate_refresh_token(&self, user_id: Uuid, username: &str, role: Role) -> Result<String, AuthError>;

    /// Validate and decode a refresh token.
    fn validate_refresh_token(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// Password hashing service.
pub trait PasswordService: Send + Sync {
    /// Hash a plain text password.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Verify a password against a hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Hashing error: {0}")]
    HashingError(String),
}
