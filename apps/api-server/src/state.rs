//! Application state - shared across all handlers.

#[cfg(feature = "postgres")]
use std::sync::Arc;

use quill_core::services::{
    CategoryService, CommentService, PostService, Repositories, UserService,
};
use quill_infra::{DatabaseConfig, InMemoryStore};

#[cfg(feature = "postgres")]
use quill_infra::{DatabaseConnections, postgres_repositories};

/// Where the repositories keep their data.
#[derive(Clone)]
pub enum Storage {
    Memory,
    #[cfg(feature = "postgres")]
    Postgres(Arc<DatabaseConnections>),
}

impl Storage {
    pub fn name(&self) -> &'static str {
        match self {
            Storage::Memory => "memory",
            #[cfg(feature = "postgres")]
            Storage::Postgres(_) => "postgres",
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub posts: PostService,
    pub comments: CommentService,
    pub categories: CategoryService,
    pub users: UserService,
    pub storage: Storage,
}

impl AppState {
    pub fn from_repositories(repos: Repositories, storage: Storage) -> Self {
        Self {
            posts: PostService::new(repos.clone()),
            comments: CommentService::new(repos.clone()),
            categories: CategoryService::new(repos.clone()),
            users: UserService::new(repos.clone()),
            repos,
            storage,
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::from_repositories(InMemoryStore::new().repositories(), Storage::Memory)
    }

    /// Connect to PostgreSQL when configured, otherwise fall back to the
    /// in-memory store.
    pub async fn new(db_config: Option<&DatabaseConfig>) -> Self {
        #[cfg(feature = "postgres")]
        match db_config {
            Some(config) => match DatabaseConnections::init(config).await {
                Ok(connections) => {
                    let connections = Arc::new(connections);
                    let repos = postgres_repositories(connections.main.clone());
                    tracing::info!("Application state initialized (postgres)");
                    return Self::from_repositories(repos, Storage::Postgres(connections));
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory store.",
                        e
                    );
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Running with the in-memory store.");
            }
        }

        #[cfg(not(feature = "postgres"))]
        if db_config.is_some() {
            tracing::warn!("Built without the postgres feature; DATABASE_URL is ignored");
        }

        tracing::info!("Application state initialized (memory)");
        Self::in_memory()
    }
}
