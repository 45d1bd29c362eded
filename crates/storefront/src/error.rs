//! Error reporting with Sentry integration.
//!
//! Data-access failures travel as [`StoreError`] inside `Resource::Error`.
//! View models call [`report`] when they fold one into screen state so that
//! backend faults reach Sentry while user mistakes stay local.

use thiserror::Error;

pub use opticart_core::StoreError;

use crate::config::ConfigError;

/// Failures while wiring the application together.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection or migration failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Record a failure surfaced to the UI.
///
/// Backend faults and corrupt documents are captured to Sentry. Offline and
/// input errors are only logged.
pub fn report(error: &StoreError, context: &str) {
    match error {
        StoreError::Backend(_) | StoreError::DataCorruption(_) => {
            let event_id = sentry::capture_error(error);
            tracing::error!(
                error = %error,
                sentry_event_id = %event_id,
                context,
                "Store error"
            );
        }
        StoreError::Network(_) | StoreError::PermissionDenied(_) => {
            tracing::warn!(error = %error, context, "Store unavailable");
        }
        StoreError::NotFound { .. }
        | StoreError::Unauthenticated
        | StoreError::Validation(_)
        | StoreError::Conflict(_) => {
            tracing::debug!(error = %error, context, "Store rejected request");
        }
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("navigation", "Opened product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
