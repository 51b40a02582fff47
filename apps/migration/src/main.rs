//! Migration CLI tool.
//!
//! Reads `DATABASE_URL` (from the environment or `.env`) and applies the
//! schema, e.g. `cargo run -p migration -- up`.

use sea_orm_migration::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Running Quill migrations");
    cli::run_cli(migration::Migrator).await;
}
