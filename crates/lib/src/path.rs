//! Structural paths and their resolution against a graph.
//!
//! An [`ObjectPath`] addresses a node (and optionally one element of it)
//! independently of object references: a sequence of member, index, and
//! item-id steps walked from a root node. Resolution is speculative: an
//! unreachable step yields `None`, never an error.

use std::fmt;

use crate::graph::{Graph, NodeId};
use crate::identity::{Index, ItemId};

/// One step of an [`ObjectPath`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PathStep {
    /// Descend to the named member child.
    Member(String),
    /// Address an element by its current position or key.
    Index(Index),
    /// Address an element by its stable item id.
    ItemId(ItemId),
}

/// An ordered sequence of steps from a root node to a target.
///
/// # Examples
///
/// ```
/// use lineage::{Index, ObjectPath};
///
/// let path = ObjectPath::new()
///     .member("parts")
///     .index(Index::Position(2))
///     .member("name");
/// assert_eq!(path.to_string(), ".parts[2].name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectPath {
    steps: Vec<PathStep>,
}

impl ObjectPath {
    /// Creates an empty path (addresses the root itself).
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member step.
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep::Member(name.into()));
        self
    }

    /// Appends an index step.
    pub fn index(mut self, index: Index) -> Self {
        self.steps.push(PathStep::Index(index));
        self
    }

    /// Appends an item-id step.
    pub fn item(mut self, id: ItemId) -> Self {
        self.steps.push(PathStep::ItemId(id));
        self
    }

    /// The steps in order.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// True if the path has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                PathStep::Member(name) => write!(f, ".{name}")?,
                PathStep::Index(Index::Position(p)) => write!(f, "[{p}]")?,
                PathStep::Index(Index::Key(k)) => write!(f, "[{k:?}]")?,
                PathStep::Index(Index::Empty) => write!(f, "[]")?,
                PathStep::ItemId(id) => write!(f, "{{{id}}}")?,
            }
        }
        Ok(())
    }
}

/// Result of resolving an [`ObjectPath`]: the reached node, the index of
/// the addressed element (or `Empty` for the node's content itself), and
/// whether the final addressing step was a raw index rather than a stable
/// item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The node the path reached.
    pub node: NodeId,
    /// The element addressed within that node's content.
    pub index: Index,
    /// True when the last addressing step was a raw `Index` step, meaning
    /// an override at this location applies to the key itself.
    pub override_on_key: bool,
}

impl Graph {
    /// Walks a structural path from `root`, dereferencing through reference
    /// contents whenever a step traverses a reference boundary.
    ///
    /// Returns `None` if any step is unreachable.
    pub fn resolve_object_path(&self, root: NodeId, path: &ObjectPath) -> Option<Resolved> {
        let mut node = root;
        let mut index = Index::Empty;
        let mut override_on_key = false;
        let steps = path.steps();

        for (position, step) in steps.iter().enumerate() {
            let last = position + 1 == steps.len();
            match step {
                PathStep::Member(name) => {
                    index = Index::Empty;
                    override_on_key = false;
                    if let Some(target) = self.node(node).ok()?.content().value().as_reference() {
                        node = target;
                    }
                    node = self.node(node).ok()?.child(name)?;
                }
                PathStep::Index(step_index) => {
                    index = step_index.clone();
                    override_on_key = true;
                    if !last && let Some(target) = self.indexed_target(node, step_index) {
                        node = target;
                    }
                }
                PathStep::ItemId(id) => {
                    let ids = self.try_item_ids(node).ok().flatten()?;
                    index = ids.index_of(*id)?;
                    override_on_key = false;
                    if !last && let Some(target) = self.indexed_target(node, &index) {
                        node = target;
                    }
                }
            }
        }

        Some(Resolved {
            node,
            index,
            override_on_key,
        })
    }
}
