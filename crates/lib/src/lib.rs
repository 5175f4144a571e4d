//!
//! Lineage: a change-tracked object graph with base/derived override semantics.
//!
//! A [`Graph`](graph::Graph) is a tree of nodes holding structured values.
//! A graph can be derived from a base graph: edits made on the base propagate
//! into the derived graph, while local edits on the derived graph are recorded
//! as overrides that shield the edited units from further propagation.
//!
//! ## Core Concepts
//!
//! * **Values (`value::Value`)**: The structured data a node holds: scalars,
//!   ordered collections, keyed dictionaries, and references to other nodes.
//! * **Graphs and Nodes (`graph::Graph`, `graph::Node`)**: Nodes carry content
//!   and named member children; every mutation flows through a single guarded
//!   pipeline that validates first and notifies observers afterwards.
//! * **Item identity (`identity::ItemIds`)**: Collection elements carry stable
//!   ids that survive reordering, so base and derived collections stay in
//!   correspondence even when their positions diverge.
//! * **Overrides (`overrides`)**: Per-unit markers (whole content, single item,
//!   dictionary key, or remembered deletion) recording which parts of a derived
//!   graph diverge from its base.
//! * **Reconciliation (`reconcile`)**: Deriving a graph from a base, replaying
//!   base changes into derived graphs, and rolling overridden units back to
//!   their base state.
//! * **Paths (`path::ObjectPath`)**: Structural addresses that resolve through
//!   reference boundaries to a node and an element within it.

pub mod graph;
pub mod identity;
pub mod overrides;
pub mod path;
pub mod reconcile;
pub mod value;

pub use graph::{
    ChangeEvent, ChangeKind, Content, Graph, GraphEvent, GraphObserver, MemberPolicy, Node,
    NodeId, NodeKind,
};
pub use identity::{Index, ItemId, ItemIds};
pub use overrides::OverrideType;
pub use path::{ObjectPath, PathStep, Resolved};
pub use value::{Shape, Value};

/// Result type used throughout the Lineage library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Lineage library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured graph errors from the graph module
    #[error(transparent)]
    Graph(graph::GraphError),

    /// Structured item identity errors from the identity module
    #[error(transparent)]
    Identity(identity::IdentityError),

    /// Structured base/derived correspondence errors from the reconcile module
    #[error(transparent)]
    Reconcile(reconcile::ReconcileError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Graph(_) => "graph",
            Error::Identity(_) => "identity",
            Error::Reconcile(_) => "reconcile",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Graph(graph_err) => graph_err.is_not_found(),
            Error::Identity(identity_err) => identity_err.is_not_found(),
            Error::Reconcile(reconcile_err) => reconcile_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a shape or index validation failure.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Graph(graph_err) => !graph_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is graph-related.
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Error::Graph(_))
    }

    /// Check if this error is identity-related.
    pub fn is_identity_error(&self) -> bool {
        matches!(self, Error::Identity(_))
    }

    /// Check if this error is reconciliation-related.
    pub fn is_reconcile_error(&self) -> bool {
        matches!(self, Error::Reconcile(_))
    }
}
