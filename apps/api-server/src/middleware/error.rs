//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, error::BlockingError, http::StatusCode};
use thiserror::Error;

use quill_core::error::{DomainError, RepoError};
use quill_core::ports::AuthError;
use quill_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    /// `retryable` is set when the request lost a race and may succeed if
    /// sent again unchanged.
    #[error("Conflict: {detail}")]
    Conflict { detail: String, retryable: bool },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation errors: {0:?}")]
    Validation(Vec<String>),
}

impl AppError {
    pub fn conflict(detail: impl Into<String>) -> Self {
        AppError::Conflict {
            detail: detail.into(),
            retryable: false,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Unauthorized => ErrorResponse::unauthorized(),
            AppError::Forbidden => ErrorResponse::forbidden(),
            AppError::Conflict { detail, retryable } => {
                let error = ErrorResponse::conflict(detail);
                if *retryable { error.retryable() } else { error }
            }
            AppError::Internal(detail) => {
                // Log internal errors
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
            AppError::Validation(errors) => {
                ErrorResponse::new(422, "Validation Failed").with_detail(errors.join(", "))
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

// Conversion from domain errors
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, key } => {
                AppError::NotFound(format!("{entity_type} '{key}' not found"))
            }
            DomainError::Validation(msg) => AppError::Validation(vec![msg]),
            DomainError::Duplicate(msg) => AppError::conflict(msg),
            DomainError::Conflict(msg) => AppError::Conflict {
                detail: msg,
                retryable: true,
            },
            DomainError::Unauthorized => AppError::Unauthorized,
            DomainError::Forbidden => AppError::Forbidden,
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".to_string()),
            RepoError::UniqueViolation(column) => AppError::conflict(format!("{column} already in use")),
            RepoError::Constraint(msg) => AppError::conflict(msg),
            RepoError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
            RepoError::Query(msg) => {
                tracing::error!("Database query error: {}", msg);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => AppError::Forbidden,
            AuthError::HashingError(msg) => AppError::Internal(msg),
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken(_)
            | AuthError::MissingAuth => AppError::Unauthorized,
        }
    }
}

impl From<BlockingError> for AppError {
    fn from(err: BlockingError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::not_found("Post", "missing"), StatusCode::NOT_FOUND),
            (DomainError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::Duplicate("email".into()), StatusCode::CONFLICT),
            (DomainError::Conflict("slug".into()), StatusCode::CONFLICT),
            (DomainError::Forbidden, StatusCode::FORBIDDEN),
            (DomainError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_only_races_are_retryable() {
        assert!(matches!(
            AppError::from(DomainError::Conflict("slug".into())),
            AppError::Conflict { retryable: true, .. }
        ));
        assert!(matches!(
            AppError::from(RepoError::UniqueViolation("email".into())),
            AppError::Conflict { retryable: false, .. }
        ));
    }

    #[actix_rt::test]
    async fn test_slug_race_renders_retryable_problem() {
        let resp = AppError::from(DomainError::Conflict("slug 'hello' was taken".into()))
            .error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 409);
        assert_eq!(body["title"], "Conflict");
        assert_eq!(body["retryable"], true);
    }

    #[actix_rt::test]
    async fn test_internal_details_are_not_leaked() {
        let resp = AppError::Internal("connection refused at 10.0.0.3".into()).error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("detail").is_none());
    }
}
