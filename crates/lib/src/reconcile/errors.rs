//! Error types for base-link and reconciliation operations.

use thiserror::Error;

use crate::identity::{Index, ItemId};

/// Structured error types for reconciliation with a base graph.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Removal correspondence between base and derived collections did not
    /// produce exactly one candidate, so the removal cannot be applied
    /// safely.
    #[error(
        "cannot find a unique item in the derived collection corresponding to the base removal ({candidates} candidates)"
    )]
    AmbiguousCorrespondence { candidates: usize },

    /// No item id is registered at the given index of the base collection.
    #[error("no identifier matches index {index} in the base collection")]
    BaseIdentifierNotFound { index: Index },

    /// A restore failed to register a replacement id for the restored item.
    #[error("restoring item {id} did not register a replacement id")]
    RestoreIdNotGenerated { id: ItemId },
}

impl ReconcileError {
    /// Check if this error indicates a missing correspondence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::BaseIdentifierNotFound { .. })
    }
}

// Conversion from ReconcileError to the main Error type
impl From<ReconcileError> for crate::Error {
    fn from(err: ReconcileError) -> Self {
        crate::Error::Reconcile(err)
    }
}
