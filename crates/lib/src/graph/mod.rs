//! Graph nodes, contents, and the mutation pipeline.
//!
//! A [`Graph`] owns a set of [`Node`]s, each wrapping one [`Content`]. All
//! mutation flows through the graph's operations, which invoke a fixed
//! sequence of pre/post hooks around the actual change: `Preparing` →
//! `Changing` → mutation → change reaction (identity + override
//! bookkeeping) → `Changed` → `Finalizing`. The hooks are explicit calls
//! made by the mutation operation itself, so ordering and re-entrancy are
//! deterministic and inspectable.
//!
//! Nodes may be linked to a *base* node in another graph instance. The link
//! is non-owning: only the base [`NodeId`] is stored, and every operation
//! that consults the base takes the base graph as an explicit `&Graph`
//! argument (see the [`reconcile`](crate::reconcile) module).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::Result;
use crate::identity::Index;
use crate::value::{Shape, Value};

pub mod content;
pub mod errors;
pub mod event;

pub use content::{Content, MemberPolicy};
pub use errors::GraphError;
pub use event::{ChangeEvent, ChangeKind, GraphEvent, GraphObserver};

/// Stable identity of a node within its graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role a node plays in the graph.
///
/// All kinds share the same fields; only `Member` nodes participate in
/// override tracking (see [`Node::supports_overrides`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A node wrapping a whole object with named member children.
    Object,
    /// A node wrapping a standalone value reached through a reference.
    Boxed,
    /// A node wrapping one member of an object.
    Member,
}

/// One node of the graph: a named, uniquely-identified wrapper around a
/// [`Content`], with member children and an optional base link.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    supports_overrides: bool,
    children: BTreeMap<String, NodeId>,
    pub(crate) content: Content,
    base: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind, content: Content) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            supports_overrides: matches!(kind, NodeKind::Member),
            children: BTreeMap::new(),
            content,
            base: None,
        }
    }

    /// The node's stable id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's display name (member name for member nodes).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's role.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node participates in override tracking.
    pub fn supports_overrides(&self) -> bool {
        self.supports_overrides
    }

    /// The node's content.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The base node in the base graph, if linked.
    pub fn base(&self) -> Option<NodeId> {
        self.base
    }

    /// The named member child, if present.
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Member children in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// The structural mutation to perform, resolved by the public operations.
#[derive(Debug)]
pub(crate) enum Mutation {
    Update { index: Index, value: Value },
    Add { index: Index, value: Value },
    Remove { index: Index },
}

/// Where an edit enters the graph from.
///
/// Local edits mark overrides; edits replayed from a base graph do not, and
/// adopt the item ids the base created. The replay path threads this through
/// every mutation explicitly, so no node-level "mid-update" flag is needed
/// to tell the two apart.
#[derive(Clone, Copy)]
pub(crate) enum Origin<'a> {
    /// A genuine local edit.
    Local,
    /// A change replayed from the linked base graph.
    Base(&'a Graph),
}

impl Origin<'_> {
    pub(crate) fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// An in-memory, change-tracked object graph.
///
/// A graph owns its nodes exclusively; all reads and mutations go through
/// id-based accessors. The model is single-threaded, synchronous, and
/// re-entrant: every operation completes before returning, observers run
/// inline, and there is no background processing.
///
/// # Examples
///
/// ```
/// use lineage::{Graph, Index, MemberPolicy, Value};
///
/// let mut graph = Graph::new_object("thing");
/// let root = graph.root();
/// let tags = graph
///     .add_member(root, "tags", Value::Collection(vec![]), MemberPolicy::default())
///     .unwrap();
///
/// graph.add_item(tags, Index::Position(0), "first".into()).unwrap();
/// assert_eq!(graph.retrieve_item(tags, &Index::Position(0)).unwrap(), "first");
/// ```
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    observers: Vec<Box<dyn GraphObserver>>,
    /// Container policy: when false, local edits stop being recorded as
    /// overrides (the identity bookkeeping still runs).
    pub(crate) propagate_changes_from_base: bool,
    /// Re-entrancy guard: true while a reset-override operation is applying
    /// its own content updates, so the reaction does not re-mark them.
    pub(crate) resetting_override: bool,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Graph {
    /// Creates a graph with a single root object node.
    pub fn new_object(name: impl Into<String>) -> Self {
        let root = Node::new(
            name,
            NodeKind::Object,
            Content::new(Value::Null, MemberPolicy::default()),
        );
        let root_id = root.id();
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            nodes,
            root: root_id,
            observers: Vec::new(),
            propagate_changes_from_base: true,
            resetting_override: false,
        }
    }

    /// The root node's id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| GraphError::UnknownNode { node: id }.into())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::UnknownNode { node: id }.into())
    }

    /// Iterates over all node ids.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Adds a member node under `parent`, wrapping `value` under the given
    /// policy. Member names must be unique per parent.
    pub fn add_member(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: Value,
        policy: MemberPolicy,
    ) -> Result<NodeId> {
        let name = name.into();
        let parent_node = self.node(parent)?;
        if parent_node.children.contains_key(&name) {
            return Err(GraphError::DuplicateMember { node: parent, name }.into());
        }
        let node = Node::new(name.clone(), NodeKind::Member, Content::new(value, policy));
        let id = node.id();
        self.nodes.insert(id, node);
        self.node_mut(parent)?.children.insert(name, id);
        Ok(id)
    }

    /// Adds a standalone object node (the target of references).
    pub fn add_object(&mut self, name: impl Into<String>) -> NodeId {
        let node = Node::new(
            name,
            NodeKind::Object,
            Content::new(Value::Null, MemberPolicy::default()),
        );
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Adds a boxed node wrapping a standalone value.
    pub fn add_boxed(&mut self, value: Value) -> NodeId {
        let node = Node::new(
            "(boxed)",
            NodeKind::Boxed,
            Content::new(value, MemberPolicy::default()),
        );
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Inserts a fully-formed node, returning its id. Used when forking a
    /// graph from a base.
    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Registers an existing node as a named member child of `parent`.
    pub(crate) fn link_child(&mut self, parent: NodeId, name: &str, child: NodeId) -> Result<()> {
        self.node_mut(parent)?.children.insert(name.to_string(), child);
        Ok(())
    }

    /// Points `node`'s content at `target` as a reference edge.
    ///
    /// This is a construction-time operation; it does not dispatch events.
    pub fn set_reference(&mut self, node: NodeId, target: NodeId) -> Result<()> {
        self.node(target)?;
        *self.node_mut(node)?.content.value_mut() = Value::Reference(target);
        Ok(())
    }

    /// Links `node` to its base node in another graph instance.
    ///
    /// The link is non-owning: only the id is stored, and operations that
    /// consult the base take the base graph explicitly.
    pub fn set_base(&mut self, node: NodeId, base: Option<NodeId>) -> Result<()> {
        self.node_mut(node)?.base = base;
        Ok(())
    }

    /// Registers an observer for mutation and override events.
    pub fn add_observer(&mut self, observer: Box<dyn GraphObserver>) {
        self.observers.push(observer);
    }

    /// Registers a closure observer.
    pub fn observe(&mut self, observer: impl FnMut(&GraphEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Whether local edits are recorded as overrides.
    pub fn propagates_changes_from_base(&self) -> bool {
        self.propagate_changes_from_base
    }

    /// Sets the container policy controlling override recording.
    pub fn set_propagate_changes_from_base(&mut self, propagate: bool) {
        self.propagate_changes_from_base = propagate;
    }

    /// Reads a node's content value.
    pub fn retrieve(&self, node: NodeId) -> Result<&Value> {
        Ok(self.node(node)?.content.value())
    }

    /// Reads one element of a node's content.
    ///
    /// Reference contents delegate to the referenced node, so indices over a
    /// reference enumerate the referenced collection or dictionary.
    pub fn retrieve_item(&self, node: NodeId, index: &Index) -> Result<Value> {
        let value = self.node(node)?.content.value();
        let value = match value {
            Value::Reference(target) => self.node(*target)?.content.value(),
            other => other,
        };
        value
            .item(index)
            .cloned()
            .ok_or_else(|| GraphError::ItemNotFound {
                index: index.clone(),
            }
            .into())
    }

    /// The node referenced by the element at `index`, if that element is a
    /// reference.
    pub fn indexed_target(&self, node: NodeId, index: &Index) -> Option<NodeId> {
        let value = self.node(node).ok()?.content.value();
        let value = match value {
            Value::Reference(target) => self.node(*target).ok()?.content.value(),
            other => other,
        };
        value.item(index)?.as_reference()
    }

    /// Replaces the node's whole content value.
    pub fn update(&mut self, node: NodeId, value: Value) -> Result<()> {
        self.mutate(
            node,
            Mutation::Update {
                index: Index::Empty,
                value,
            },
            Origin::Local,
        )?;
        Ok(())
    }

    /// Replaces one element's value.
    pub fn update_item(&mut self, node: NodeId, index: &Index, value: Value) -> Result<()> {
        self.mutate(
            node,
            Mutation::Update {
                index: index.clone(),
                value,
            },
            Origin::Local,
        )?;
        Ok(())
    }

    /// Adds an element to a collection (at a position) or dictionary (under
    /// a key).
    ///
    /// Identity-tracked ordered collections require an explicit position;
    /// an empty index fails fast with [`GraphError::UnindexedAdd`].
    pub fn add_item(&mut self, node: NodeId, index: Index, value: Value) -> Result<()> {
        self.mutate(node, Mutation::Add { index, value }, Origin::Local)?;
        Ok(())
    }

    /// Removes the element at `index`.
    pub fn remove_item(&mut self, node: NodeId, index: &Index) -> Result<()> {
        self.mutate(
            node,
            Mutation::Remove {
                index: index.clone(),
            },
            Origin::Local,
        )?;
        Ok(())
    }

    /// Backfills the node's identity registry from its current value.
    ///
    /// Returns the number of fresh ids assigned, or an unchanged registry
    /// for contents that are already fully tracked. Non-identifiable and
    /// plain contents are left alone.
    pub fn ensure_item_ids(&mut self, node: NodeId) -> Result<usize> {
        let node = self.node_mut(node)?;
        let value = node.content.value().clone();
        Ok(match node.content.item_ids_mut() {
            Some(ids) => ids.ensure(&value),
            None => 0,
        })
    }

    /// Runs one mutation through the full hook pipeline.
    ///
    /// Validation happens before any state changes or events: a failed
    /// mutation changes nothing and dispatches nothing.
    pub(crate) fn mutate(
        &mut self,
        node_id: NodeId,
        mutation: Mutation,
        origin: Origin<'_>,
    ) -> Result<ChangeEvent> {
        self.validate(node_id, &mutation)?;
        // Backfill ids before the change applies, so a removed element has
        // an id to tombstone even on the collection's first structural touch.
        self.ensure_item_ids(node_id)?;
        trace!(node = %node_id, ?mutation, "applying mutation");

        self.dispatch(GraphEvent::Preparing { node: node_id });

        let (index, old) = self.peek(node_id, &mutation)?;
        self.dispatch(GraphEvent::Changing {
            node: node_id,
            index,
            old,
        });

        let event = self.apply(node_id, mutation)?;
        self.react_to_change(&event, origin)?;
        self.dispatch(GraphEvent::Changed(event.clone()));

        self.dispatch(GraphEvent::Finalizing { node: node_id });

        debug!(node = %node_id, kind = ?event.kind, index = %event.index, "content changed");
        Ok(event)
    }

    /// Checks a mutation against the content's shape without mutating.
    fn validate(&self, node_id: NodeId, mutation: &Mutation) -> Result<()> {
        let node = self.node(node_id)?;
        let content = &node.content;
        let value = content.value();
        let shape = value.shape();
        match mutation {
            Mutation::Update { index, .. } => {
                if index.is_empty() {
                    return Ok(());
                }
                if shape == Shape::Plain {
                    return Err(GraphError::ShapeMismatch {
                        operation: "update an element",
                        shape,
                    }
                    .into());
                }
                if value.item(index).is_none() {
                    return Err(GraphError::ItemNotFound {
                        index: index.clone(),
                    }
                    .into());
                }
                Ok(())
            }
            Mutation::Add { index, .. } => match (shape, index) {
                (Shape::Collection, Index::Position(p)) => {
                    let len = value.count().unwrap_or(0);
                    if *p > len {
                        return Err(GraphError::ItemNotFound {
                            index: index.clone(),
                        }
                        .into());
                    }
                    Ok(())
                }
                (Shape::Collection, Index::Empty) => {
                    if content.is_identifiable() {
                        // Appends to identity-tracked collections must go
                        // through the index-aware path.
                        return Err(GraphError::UnindexedAdd.into());
                    }
                    Ok(())
                }
                (Shape::Dictionary, Index::Key(key)) => {
                    if value.item(index).is_some() {
                        return Err(GraphError::DuplicateKey { key: key.clone() }.into());
                    }
                    Ok(())
                }
                (shape, _) => Err(GraphError::ShapeMismatch {
                    operation: "add an element",
                    shape,
                }
                .into()),
            },
            Mutation::Remove { index } => {
                if shape == Shape::Plain {
                    return Err(GraphError::ShapeMismatch {
                        operation: "remove an element",
                        shape,
                    }
                    .into());
                }
                if value.item(index).is_none() {
                    return Err(GraphError::ItemNotFound {
                        index: index.clone(),
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    /// The affected index and outgoing value of a validated mutation.
    fn peek(&self, node_id: NodeId, mutation: &Mutation) -> Result<(Index, Option<Value>)> {
        let value = self.node(node_id)?.content.value();
        Ok(match mutation {
            Mutation::Update { index, .. } if index.is_empty() => {
                (Index::Empty, Some(value.clone()))
            }
            Mutation::Update { index, .. } | Mutation::Remove { index } => {
                (index.clone(), value.item(index).cloned())
            }
            Mutation::Add { index, .. } => (index.clone(), None),
        })
    }

    /// Performs a validated mutation and describes it.
    fn apply(&mut self, node_id: NodeId, mutation: Mutation) -> Result<ChangeEvent> {
        let value = self.node_mut(node_id)?.content.value_mut();
        Ok(match mutation {
            Mutation::Update { index, value: new } if index.is_empty() => {
                let old = std::mem::replace(value, new.clone());
                ChangeEvent {
                    node: node_id,
                    kind: ChangeKind::ValueChange,
                    index: Index::Empty,
                    old: Some(old),
                    new: Some(new),
                }
            }
            Mutation::Update { index, value: new } => {
                // Validated: the element exists.
                let Some(item) = value.item_mut(&index) else {
                    return Err(GraphError::ItemNotFound { index }.into());
                };
                let old = std::mem::replace(item, new.clone());
                ChangeEvent {
                    node: node_id,
                    kind: ChangeKind::ValueChange,
                    index,
                    old: Some(old),
                    new: Some(new),
                }
            }
            Mutation::Add { index, value: new } => {
                let index = match (value, index) {
                    (Value::Collection(items), Index::Position(p)) => {
                        items.insert(p, new.clone());
                        Index::Position(p)
                    }
                    (Value::Collection(items), _) => {
                        items.push(new.clone());
                        Index::Position(items.len() - 1)
                    }
                    (Value::Dictionary(entries), Index::Key(key)) => {
                        entries.insert(key.clone(), new.clone());
                        Index::Key(key)
                    }
                    (value, _) => {
                        return Err(GraphError::ShapeMismatch {
                            operation: "add an element",
                            shape: value.shape(),
                        }
                        .into());
                    }
                };
                ChangeEvent {
                    node: node_id,
                    kind: ChangeKind::CollectionAdd,
                    index,
                    old: None,
                    new: Some(new),
                }
            }
            Mutation::Remove { index } => {
                let old = match (value, &index) {
                    (Value::Collection(items), Index::Position(p)) => Some(items.remove(*p)),
                    (Value::Dictionary(entries), Index::Key(key)) => entries.remove(key),
                    _ => None,
                };
                ChangeEvent {
                    node: node_id,
                    kind: ChangeKind::CollectionRemove,
                    index,
                    old,
                    new: None,
                }
            }
        })
    }

    /// Dispatches one event to every observer, inline.
    ///
    /// Observers are taken out of the graph for the duration of the call so
    /// they may freely read the graph or register further observers.
    pub(crate) fn dispatch(&mut self, event: GraphEvent) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            observer.on_event(&event);
        }
        let added = std::mem::take(&mut self.observers);
        self.observers = observers;
        self.observers.extend(added);
    }
}
