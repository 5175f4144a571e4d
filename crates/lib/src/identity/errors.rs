//! Error types for identity registry operations.

use thiserror::Error;

use crate::identity::{Index, ItemId};

/// Structured error types for collection item identity operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The content has no identity registry (non-identifiable, or never
    /// populated).
    #[error("no item identifiers associated with the content of node '{node}'")]
    MissingIdentity { node: String },

    /// No item id is registered at the given index.
    #[error("no item id registered at index {index}")]
    IndexNotFound { index: Index },

    /// The given item id is not live in the registry.
    #[error("item id {id} is not live in the registry")]
    IdNotFound { id: ItemId },
}

impl IdentityError {
    /// Check if this error indicates the registry or an entry was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IdentityError::MissingIdentity { .. }
                | IdentityError::IndexNotFound { .. }
                | IdentityError::IdNotFound { .. }
        )
    }
}

// Conversion from IdentityError to the main Error type
impl From<IdentityError> for crate::Error {
    fn from(err: IdentityError) -> Self {
        crate::Error::Identity(err)
    }
}
