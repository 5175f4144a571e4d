//! Mutation events and the observer hook surface.
//!
//! Every graph mutation dispatches a fixed event sequence, inline and
//! synchronous: `Preparing` → `Changing` → (mutation + change reaction) →
//! `Changed` → `Finalizing`. Override flag writes additionally dispatch
//! `OverrideChanging` / `OverrideChanged` pairs. Observers run re-entrant on
//! the mutating thread; there is no deferral.

use crate::graph::NodeId;
use crate::identity::Index;
use crate::value::Value;

/// The kind of change a mutation performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChangeKind {
    /// The content value, or one element's value, was replaced.
    ValueChange,
    /// An element was added to a collection or dictionary.
    CollectionAdd,
    /// An element was removed from a collection or dictionary.
    CollectionRemove,
}

/// Description of one completed mutation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChangeEvent {
    /// The node whose content changed.
    pub node: NodeId,
    /// What kind of change occurred.
    pub kind: ChangeKind,
    /// The affected index. `Index::Empty` for content-level value changes;
    /// for removals, the index the element occupied before the removal.
    pub index: Index,
    /// The previous value of the affected unit, when one existed.
    pub old: Option<Value>,
    /// The new value of the affected unit, when one exists.
    pub new: Option<Value>,
}

/// Events dispatched to [`GraphObserver`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A mutation on the node is about to start.
    Preparing { node: NodeId },
    /// The mutation is about to be applied; carries the affected index and
    /// the outgoing value.
    Changing {
        node: NodeId,
        index: Index,
        old: Option<Value>,
    },
    /// The mutation and its bookkeeping completed.
    Changed(ChangeEvent),
    /// The mutation finished; the node is no longer mid-update.
    Finalizing { node: NodeId },
    /// An override flag on the node is about to change.
    OverrideChanging { node: NodeId },
    /// An override flag on the node changed.
    OverrideChanged { node: NodeId },
}

/// Inline listener for graph mutation and override lifecycle events.
///
/// Observers are registered on a [`Graph`](crate::graph::Graph) and invoked
/// synchronously, in registration order, as each event fires. This is the
/// integration point for undo stacks and UI refresh.
pub trait GraphObserver {
    /// Called for every event the graph dispatches.
    fn on_event(&mut self, event: &GraphEvent);
}

impl<F: FnMut(&GraphEvent)> GraphObserver for F {
    fn on_event(&mut self, event: &GraphEvent) {
        self(event)
    }
}
