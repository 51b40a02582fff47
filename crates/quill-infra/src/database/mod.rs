//! Database connection management and PostgreSQL repositories.

mod connections;

#[cfg(feature = "postgres")]
pub mod entity;
#[cfg(feature = "postgres")]
mod errors;
#[cfg(feature = "postgres")]
mod postgres_repo;

pub use connections::DatabaseConfig;

#[cfg(feature = "postgres")]
pub use connections::DatabaseConnections;

#[cfg(feature = "postgres")]
pub use postgres_repo::{
    PostgresCategoryRepository, PostgresCommentRepository, PostgresLikeRepository,
    PostgresPostRepository, PostgresTagRepository, PostgresUserRepository,
    postgres_repositories,
};

#[cfg(feature = "postgres")]
#[cfg(test)]
mod tests;
