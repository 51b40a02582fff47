//! Translation of SeaORM errors into repository errors.

use sea_orm::{DbErr, SqlErr};

use quill_core::error::RepoError;

/// Columns guarded by unique indexes, as they appear in index names.
const UNIQUE_COLUMNS: [&str; 3] = ["slug", "email", "username"];

pub(crate) fn map_db_err(err: DbErr) -> RepoError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            RepoError::UniqueViolation(violated_column(&message).to_string())
        }
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => RepoError::Constraint(message),
        _ => match err {
            DbErr::Conn(e) => RepoError::Connection(e.to_string()),
            DbErr::ConnectionAcquire(e) => RepoError::Connection(e.to_string()),
            DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => RepoError::NotFound,
            other => RepoError::Query(other.to_string()),
        },
    }
}

/// Best guess at the column behind a unique violation message such as
/// `duplicate key value violates unique constraint "idx-posts-slug"`.
pub(crate) fn violated_column(message: &str) -> &'static str {
    let constraint = message
        .split('"')
        .nth(1)
        .unwrap_or(message)
        .to_ascii_lowercase();
    UNIQUE_COLUMNS
        .into_iter()
        .find(|column| constraint.contains(column))
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violated_column_from_index_name() {
        assert_eq!(
            violated_column(r#"duplicate key value violates unique constraint "idx-posts-slug""#),
            "slug"
        );
        assert_eq!(
            violated_column(r#"duplicate key value violates unique constraint "users_email_key""#),
            "email"
        );
        assert_eq!(violated_column("something else"), "unknown");
    }

    #[test]
    fn test_record_not_updated_is_not_found() {
        assert!(matches!(map_db_err(DbErr::RecordNotUpdated), RepoError::NotFound));
        assert!(matches!(
            map_db_err(DbErr::Custom("boom".into())),
            RepoError::Query(_)
        ));
    }
}
