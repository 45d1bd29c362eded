//! Error taxonomy carried across repository boundaries.
//!
//! Every backend failure is translated into one of these variants before it
//! reaches a repository caller, so view models can tell a missing document
//! from an outage without inspecting strings.

use thiserror::Error;

/// Errors surfaced by the data-access layer.
///
/// `Clone` because a single failure may be folded into several view-model
/// states and re-emitted on a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("network unavailable: {0}")]
    Network(String),

    /// The requested document does not exist.
    #[error("{collection}/{id} not found")]
    NotFound {
        /// Collection that was queried.
        collection: String,
        /// Document ID that was requested.
        id: String,
    },

    /// The signed-in user may not read or write this document.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation needs a signed-in user and there is none.
    #[error("not signed in")]
    Unauthenticated,

    /// Input was rejected before it reached the backend.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A uniqueness or precondition check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored document could not be decoded.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`StoreError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Nothing in the app retries automatically; this drives whether a
    /// screen offers a "try again" affordance.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether this is a [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Message suitable for display in place of content.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "You appear to be offline. Check your connection.".to_string(),
            Self::NotFound { .. } => "We couldn't find what you were looking for.".to_string(),
            Self::PermissionDenied(_) => "You don't have access to this.".to_string(),
            Self::Unauthenticated => "Please sign in to continue.".to_string(),
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::DataCorruption(_) | Self::Backend(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("products", "p-404");
        assert_eq!(err.to_string(), "products/p-404 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_only_network_is_retryable() {
        assert!(StoreError::Network("timeout".into()).is_retryable());
        assert!(!StoreError::Unauthenticated.is_retryable());
        assert!(!StoreError::not_found("orders", "o1").is_retryable());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = StoreError::Backend("pg: relation does not exist".into());
        assert!(!err.user_message().contains("relation"));

        let err = StoreError::validation("Quantity must be at least 1");
        assert_eq!(err.user_message(), "Quantity must be at least 1");
    }
}
