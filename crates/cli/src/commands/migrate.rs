//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! OPTICART_BACKEND=postgres OPTICART_DATABASE_URL=postgres://... opticart migrate
//! ```
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`
//!
//! ```text
//! migrations/
//! ├── 20261001000001_create_documents.sql
//! └── 20261001000002_create_accounts.sql
//! ```

use thiserror::Error;
use tracing::info;

use opticart_storefront::db;
use opticart_storefront::{BackendKind, StorefrontConfig};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The configured backend has no schema to migrate.
    #[error("Migrations need OPTICART_BACKEND=postgres")]
    NotPostgres,

    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the backend is not Postgres, the database cannot be
/// reached or a migration fails.
pub async fn run(config: &StorefrontConfig) -> Result<(), MigrationError> {
    if config.backend != BackendKind::Postgres {
        return Err(MigrationError::NotPostgres);
    }
    let database_url = config
        .database_url
        .as_ref()
        .ok_or(MigrationError::MissingEnvVar("OPTICART_DATABASE_URL"))?;

    info!("Connecting to storefront database...");
    let pool = db::create_pool(database_url, 1).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Storefront migrations complete!");
    Ok(())
}
