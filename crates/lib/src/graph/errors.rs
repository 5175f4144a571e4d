//! Error types for graph node and content operations.

use thiserror::Error;

use crate::graph::NodeId;
use crate::identity::Index;
use crate::value::Shape;

/// Structured error types for graph mutations and lookups.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphError {
    /// The node id does not exist in this graph.
    #[error("unknown node: {node}")]
    UnknownNode { node: NodeId },

    /// The operation is not supported by the content's shape.
    #[error("cannot {operation} on {shape} content")]
    ShapeMismatch {
        operation: &'static str,
        shape: Shape,
    },

    /// No element exists at the given index.
    #[error("no element at index {index}")]
    ItemNotFound { index: Index },

    /// An item was added to an identity-tracked ordered collection without a
    /// usable position. The caller must route through the index-aware add
    /// path for such collections.
    #[error("cannot add to an identity-tracked collection without a position")]
    UnindexedAdd,

    /// A dictionary add collided with an existing key.
    #[error("key {key:?} already exists in the dictionary")]
    DuplicateKey { key: String },

    /// A member child with the given name already exists on the node.
    #[error("member {name:?} already exists on node {node}")]
    DuplicateMember { node: NodeId, name: String },
}

impl GraphError {
    /// Check if this error indicates something was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::UnknownNode { .. } | GraphError::ItemNotFound { .. }
        )
    }
}

// Conversion from GraphError to the main Error type
impl From<GraphError> for crate::Error {
    fn from(err: GraphError) -> Self {
        crate::Error::Graph(err)
    }
}
