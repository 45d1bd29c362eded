//! The three-state envelope wrapped around every repository outcome.

use crate::error::StoreError;

/// Outcome of a repository read or write.
///
/// Live reads start with `Loading`, then emit `Success` for every upstream
/// update, or a single `Error` after which the stream ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    /// The request is in flight.
    Loading,
    /// The latest value.
    Success(T),
    /// The request failed.
    Error(StoreError),
}

impl<T> Resource<T> {
    /// Whether this is [`Resource::Loading`].
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Whether this is [`Resource::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this is [`Resource::Error`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrow the value, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Take the value, if any.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the success value.
    pub fn map<U, F>(self, f: F) -> Resource<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(value) => Resource::Success(f(value)),
            Self::Error(err) => Resource::Error(err),
        }
    }

    /// Transform the success value with a fallible function.
    pub fn and_then<U, F>(self, f: F) -> Resource<U>
    where
        F: FnOnce(T) -> Result<U, StoreError>,
    {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(value) => f(value).into(),
            Self::Error(err) => Resource::Error(err),
        }
    }
}

impl<T> From<Result<T, StoreError>> for Resource<T> {
    fn from(result: Result<T, StoreError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Error(err),
        }
    }
}
