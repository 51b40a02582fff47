//! Domain-level error types.

use thiserror::Error;

/// Domain errors - business rule failures surfaced by the services.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity_type} not found: {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    /// Lost a race against a concurrent writer. The client may retry as-is.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity_type: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            key: key.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether repeating the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    /// A unique index rejected the write. Carries the offending column.
    #[error("Unique constraint violated on {0}")]
    UniqueViolation(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl RepoError {
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, Self::UniqueViolation(c) if c == column)
    }
}

impl From<RepoError> for DomainError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => DomainError::NotFound {
                entity_type: "Entity",
                key: "unknown".to_string(),
            },
            RepoError::UniqueViolation(column) => {
                DomainError::Duplicate(format!("{column} already in use"))
            }
            RepoError::Constraint(msg) => DomainError::Validation(msg),
            RepoError::Connection(msg) | RepoError::Query(msg) => DomainError::Internal(msg),
        }
    }
}
