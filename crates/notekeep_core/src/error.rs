//! Error taxonomy exposed at the core's service boundary.
//!
//! Every store-facing call site remaps `StoreError` into `CoreError` before
//! returning. All variants are recoverable by the caller.

use crate::store::{DocId, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

/// Service-boundary error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No signed-in user at mutation time.
    Unauthenticated,
    /// Empty content/category name or malformed request.
    InvalidInput(String),
    /// Target document is absent at write time.
    NotFound(DocId),
    /// Transport, timeout or backend failure from the store.
    StoreUnavailable(String),
}

impl CoreError {
    /// Stable machine-readable code for log events and callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "user not authenticated"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::StoreUnavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for CoreError {}

impl From<StoreError> for CoreError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;
    use crate::store::{Collection, StoreError};
    use uuid::Uuid;

    #[test]
    fn store_errors_remap_into_taxonomy() {
        let id = Uuid::new_v4();
        let not_found = CoreError::from(StoreError::NotFound {
            collection: Collection::Notes,
            id,
        });
        assert_eq!(not_found, CoreError::NotFound(id));

        let unavailable = CoreError::from(StoreError::Unavailable("timeout".to_string()));
        assert_eq!(unavailable.code(), "store_unavailable");
        assert_eq!(unavailable.to_string(), "store unavailable: timeout");
    }
}
