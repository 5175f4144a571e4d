//! Base links and reconciliation between a derived graph and its base.
//!
//! A derived graph is linked node-by-node to a base graph in another
//! [`Graph`] instance. The link is non-owning: each node stores only the
//! base [`NodeId`], and every operation here takes the base graph as an
//! explicit `&Graph` argument.
//!
//! Three operations make up the surface:
//!
//! - [`Graph::apply_base_change`] replays one base mutation into the linked
//!   derived nodes, at the structurally-equivalent position, without
//!   creating overrides.
//! - [`Graph::derived_index`] maps an index in a base collection to the
//!   corresponding index in the derived collection, by item id, even when
//!   the two have diverged in order or size.
//! - [`Graph::reset_override`] clears overrides recursively and then
//!   [`Graph::reconcile_with_base`] re-derives every still-inherited value
//!   from the base's current state.
//!
//! All traversal is depth-first pre-order, driven by explicit stacks.

use std::collections::HashMap;

use tracing::debug;

use crate::Result;
use crate::graph::{
    ChangeEvent, ChangeKind, Content, Graph, MemberPolicy, Mutation, Node, NodeId, Origin,
};
use crate::identity::{Index, ItemId};
use crate::value::{Shape, Value, clone_from_base};

pub mod errors;
pub use errors::ReconcileError;

/// Rewrites reference edges through a base→derived node mapping, leaving
/// unmapped references untouched.
fn remap_references(value: &mut Value, map: &HashMap<NodeId, NodeId>) {
    match value {
        Value::Reference(id) => {
            if let Some(mapped) = map.get(id) {
                *id = *mapped;
            }
        }
        Value::Collection(items) => {
            for item in items {
                remap_references(item, map);
            }
        }
        Value::Dictionary(entries) => {
            for item in entries.values_mut() {
                remap_references(item, map);
            }
        }
        _ => {}
    }
}

impl Graph {
    /// Forks a derived graph from `base`: same structure, cloned values with
    /// references remapped, shared item ids, and every node linked to its
    /// base counterpart.
    ///
    /// Item ids are copied from the base registries where they exist, so
    /// ids of items originating from the base stay aligned between the two
    /// graphs.
    pub fn derive_from(base: &Graph) -> Result<Graph> {
        let base_root = base.node(base.root())?;
        let mut derived = Graph::new_object(base_root.name().to_string());
        let mut map: HashMap<NodeId, NodeId> = HashMap::new();
        map.insert(base.root(), derived.root());

        for base_id in base.node_ids() {
            if base_id == base.root() {
                continue;
            }
            let base_node = base.node(base_id)?;
            let policy = MemberPolicy {
                identifiable: base_node.content().is_identifiable(),
                overridable: base_node.content().is_overridable(),
            };
            let node = Node::new(
                base_node.name().to_string(),
                base_node.kind(),
                Content::new(Value::Null, policy),
            );
            let id = derived.insert_node(node);
            map.insert(base_id, id);
        }

        for base_id in base.node_ids() {
            let Some(&derived_id) = map.get(&base_id) else {
                continue;
            };
            let base_node = base.node(base_id)?;
            for (name, child) in base_node.children() {
                if let Some(&derived_child) = map.get(&child) {
                    derived.link_child(derived_id, name, derived_child)?;
                }
            }
            let mut value = clone_from_base(base_node.content().value());
            remap_references(&mut value, &map);
            *derived.node_mut(derived_id)?.content.value_mut() = value;
            if let Some(ids) = base_node.content().item_ids() {
                derived.node_mut(derived_id)?.content.set_item_ids(ids.clone());
            }
            derived.set_base(derived_id, Some(base_id))?;
        }

        debug!(nodes = derived.node_count(), "derived graph from base");
        Ok(derived)
    }

    /// Links this graph's nodes to their counterparts in `base`, pairing
    /// member children by name and reference targets structurally, starting
    /// from the roots.
    ///
    /// Where this graph lacks an identity registry and the base has one for
    /// an equal collection value, the base's ids are copied over so item
    /// correspondence works.
    pub fn link_to_base(&mut self, base: &Graph) -> Result<()> {
        let mut stack = vec![(self.root(), base.root())];
        while let Some((derived_id, base_id)) = stack.pop() {
            self.set_base(derived_id, Some(base_id))?;

            let base_node = base.node(base_id)?;
            if self.node(derived_id)?.content.item_ids().is_none()
                && let Some(base_ids) = base_node.content().item_ids()
                && self.node(derived_id)?.content.value() == base_node.content().value()
            {
                self.node_mut(derived_id)?.content.set_item_ids(base_ids.clone());
            }

            // Pair reference targets.
            if let (Some(derived_target), Some(base_target)) = (
                self.node(derived_id)?.content.value().as_reference(),
                base_node.content().value().as_reference(),
            ) {
                stack.push((derived_target, base_target));
            }

            // Pair member children by name.
            let pairs: Vec<(NodeId, NodeId)> = self
                .node(derived_id)?
                .children()
                .filter_map(|(name, child)| base_node.child(name).map(|b| (child, b)))
                .collect();
            stack.extend(pairs);
        }
        Ok(())
    }

    /// Maps an index in the base collection to the corresponding index in
    /// this instance's collection, by item id, so a base change can be
    /// replayed at the structurally-equivalent position even if the two
    /// collections have diverged in order or size.
    ///
    /// - `ValueChange`: the base item's id looked up here; `Empty` when the
    ///   item was locally deleted.
    /// - `CollectionAdd`: for ordered collections, walks backward from the
    ///   base position until an id also live here is found and inserts right
    ///   after it (position 0 when none is); keyed collections reuse the
    ///   base key verbatim.
    /// - `CollectionRemove`: the unique id live here but gone from the base;
    ///   zero or several candidates is an ambiguous correspondence error.
    pub fn derived_index(
        &self,
        base: &Graph,
        node: NodeId,
        base_index: &Index,
        kind: ChangeKind,
    ) -> Result<Index> {
        let Some(base_node) = self.node(node)?.base() else {
            return Ok(Index::Empty);
        };
        match kind {
            ChangeKind::ValueChange => {
                if base_index.is_empty() {
                    return Ok(Index::Empty);
                }
                let Some(base_item) = base.try_index_to_id(base_node, base_index)? else {
                    return Ok(Index::Empty);
                };
                Ok(self
                    .try_id_to_index(node, base_item)?
                    .unwrap_or(Index::Empty))
            }
            ChangeKind::CollectionAdd => {
                if base_index.is_empty() {
                    return Ok(Index::Empty);
                }
                base.try_index_to_id(base_node, base_index)?.ok_or_else(|| {
                    ReconcileError::BaseIdentifierNotFound {
                        index: base_index.clone(),
                    }
                })?;
                match base_index {
                    Index::Position(position) => {
                        // Find the closest preceding base item that also
                        // exists here, and insert right after it.
                        for preceding in (0..*position).rev() {
                            let before = Index::Position(preceding);
                            let id = base.try_index_to_id(base_node, &before)?.ok_or_else(
                                || ReconcileError::BaseIdentifierNotFound { index: before },
                            )?;
                            if let Some(local) = self.try_id_to_index(node, id)?
                                && let Some(p) = local.position()
                            {
                                return Ok(Index::Position(p + 1));
                            }
                        }
                        Ok(Index::Position(0))
                    }
                    keyed => Ok(keyed.clone()),
                }
            }
            ChangeKind::CollectionRemove => {
                let base_ids = base.item_ids(base_node)?;
                let derived_ids = self.item_ids(node)?;
                let candidates: Vec<Index> = base_ids
                    .find_missing_ids(derived_ids)
                    .into_iter()
                    .filter_map(|id| derived_ids.index_of(id))
                    .collect();
                match candidates.as_slice() {
                    [index] => Ok(index.clone()),
                    found => Err(ReconcileError::AmbiguousCorrespondence {
                        candidates: found.len(),
                    }
                    .into()),
                }
            }
        }
    }

    /// Replays one base mutation into every node of this graph linked to
    /// `base_node`, at the `derived_index`-mapped position.
    ///
    /// Replayed edits never create overrides, and added items adopt the id
    /// the base created. Units that are locally overridden (or locally
    /// deleted, for value changes) are left untouched.
    pub fn apply_base_change(
        &mut self,
        base: &Graph,
        base_node: NodeId,
        event: &ChangeEvent,
    ) -> Result<()> {
        let targets: Vec<NodeId> = self
            .node_ids()
            .filter(|id| {
                self.node(*id)
                    .map(|n| n.base() == Some(base_node))
                    .unwrap_or(false)
            })
            .collect();

        for node in targets {
            debug!(node = %node, kind = ?event.kind, "replaying base change");
            match event.kind {
                ChangeKind::ValueChange => {
                    let new = clone_from_base(event.new.as_ref().unwrap_or(&Value::Null));
                    if event.index.is_empty() {
                        if self.is_content_overridden(node)? {
                            continue;
                        }
                        self.mutate(
                            node,
                            Mutation::Update {
                                index: Index::Empty,
                                value: new,
                            },
                            Origin::Base(base),
                        )?;
                    } else {
                        let index =
                            self.derived_index(base, node, &event.index, ChangeKind::ValueChange)?;
                        if index.is_empty() || self.is_item_overridden(node, &index)? {
                            continue;
                        }
                        self.mutate(
                            node,
                            Mutation::Update { index, value: new },
                            Origin::Base(base),
                        )?;
                    }
                }
                ChangeKind::CollectionAdd => {
                    let index =
                        self.derived_index(base, node, &event.index, ChangeKind::CollectionAdd)?;
                    if index.key().is_some() && self.retrieve(node)?.item(&index).is_some() {
                        // The key already exists locally; the local entry wins.
                        continue;
                    }
                    let value = clone_from_base(event.new.as_ref().unwrap_or(&Value::Null));
                    self.mutate(node, Mutation::Add { index, value }, Origin::Base(base))?;
                }
                ChangeKind::CollectionRemove => {
                    let index =
                        self.derived_index(base, node, &event.index, ChangeKind::CollectionRemove)?;
                    if index.is_empty() || self.is_item_overridden(node, &index)? {
                        continue;
                    }
                    self.mutate(
                        node,
                        Mutation::Remove { index },
                        Origin::Base(base),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Clears the given unit's override, then recursively clears every
    /// descendant's overrides, then reconciles the subtree with the base.
    ///
    /// The descendant walk is depth-first pre-order over member children and
    /// reference targets; the root node only has the named unit cleared.
    pub fn reset_override(&mut self, base: &Graph, node: NodeId, index: &Index) -> Result<()> {
        debug!(node = %node, index = %index, "resetting override");
        if index.is_empty() {
            self.override_content(node, false)?;
        } else {
            self.override_item(node, false, index)?;
        }

        self.resetting_override = true;
        let mut result = self.reset_descendants(node);
        if result.is_ok() {
            result = self.reconcile_with_base(base, node);
        }
        self.resetting_override = false;
        result
    }

    /// Clears content, item, key, and deletion overrides on every strict
    /// descendant of `node`.
    fn reset_descendants(&mut self, node: NodeId) -> Result<()> {
        let mut stack = self.child_targets(node)?;
        stack.reverse();
        while let Some(current) = stack.pop() {
            if self.node(current)?.supports_overrides() {
                self.override_content(current, false)?;
                for index in self.overridden_item_indices(current)? {
                    self.override_item(current, false, &index)?;
                }
                for index in self.overridden_key_indices(current)? {
                    self.override_key(current, false, &index)?;
                }
                for id in self.overridden_deleted_ids(current)? {
                    self.override_deleted_item(current, false, id)?;
                }
            }
            let mut next = self.child_targets(current)?;
            next.reverse();
            stack.extend(next);
        }
        Ok(())
    }

    /// Re-derives every still-inherited value in the subtree rooted at
    /// `node` from the corresponding base node's current value.
    ///
    /// Depth-first pre-order: plain contents are re-cloned when not
    /// overridden; identifiable collections are reconciled per item by id
    /// (base-only items re-added under the base's id unless their deletion
    /// is an override, shared items updated unless overridden, local items
    /// the base lacks removed unless overridden).
    pub fn reconcile_with_base(&mut self, base: &Graph, node: NodeId) -> Result<()> {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(base_node) = self.node(current)?.base() {
                self.reconcile_node(base, current, base_node)?;
            }
            let mut next = self.child_targets(current)?;
            next.reverse();
            stack.extend(next);
        }
        Ok(())
    }

    /// Reconciles one node's content against its base counterpart.
    fn reconcile_node(&mut self, base: &Graph, node: NodeId, base_node: NodeId) -> Result<()> {
        // A content-level override covers the whole unit, items included;
        // the node keeps its local value untouched.
        if self.is_content_overridden(node)? {
            return Ok(());
        }

        let base_value = base.node(base_node)?.content.value().clone();
        let content = &self.node(node)?.content;
        let shape = content.shape();
        let identifiable = content.is_identifiable();

        // Reference edges are structural; their targets reconcile through
        // the recursion, never by copying node ids across graphs.
        if matches!(self.node(node)?.content.value(), Value::Reference(_)) {
            return Ok(());
        }

        let per_item = identifiable
            && shape != Shape::Plain
            && base.node(base_node)?.content.item_ids().is_some();

        if !per_item {
            if *self.node(node)?.content.value() != base_value
                && !matches!(base_value, Value::Reference(_))
            {
                self.mutate(
                    node,
                    Mutation::Update {
                        index: Index::Empty,
                        value: clone_from_base(&base_value),
                    },
                    Origin::Base(base),
                )?;
            }
            return Ok(());
        }

        self.ensure_item_ids(node)?;
        let base_ids = base.item_ids(base_node)?.clone();

        // Remove local items the base no longer has, unless overridden.
        let local_ids: Vec<ItemId> = self.item_ids(node)?.live_ids().collect();
        for id in local_ids {
            if base_ids.contains(id) || self.is_id_overridden(node, id)? {
                continue;
            }
            if let Some(index) = self.try_id_to_index(node, id)? {
                self.mutate(node, Mutation::Remove { index }, Origin::Base(base))?;
            }
        }

        // Update shared items and re-add base items missing here.
        for (base_index, id) in base_ids.iter() {
            let Some(base_item) = base_value.item(base_index) else {
                continue;
            };
            if matches!(base_item, Value::Reference(_)) {
                continue;
            }
            match self.try_id_to_index(node, id)? {
                Some(local_index) => {
                    if self.is_id_overridden(node, id)? {
                        continue;
                    }
                    if self.retrieve_item(node, &local_index)? != *base_item {
                        self.mutate(
                            node,
                            Mutation::Update {
                                index: local_index,
                                value: clone_from_base(base_item),
                            },
                            Origin::Base(base),
                        )?;
                    }
                }
                None => {
                    if self.is_item_overridden_deleted(node, id)? {
                        // The deletion itself is an override; keep it.
                        continue;
                    }
                    let index = match base_index {
                        Index::Position(_) => self.derived_index(
                            base,
                            node,
                            base_index,
                            ChangeKind::CollectionAdd,
                        )?,
                        keyed => keyed.clone(),
                    };
                    self.node_mut(node)?.content.set_restoring_id(Some(id));
                    let result = self.mutate(
                        node,
                        Mutation::Add {
                            index,
                            value: clone_from_base(base_item),
                        },
                        Origin::Base(base),
                    );
                    self.node_mut(node)?.content.set_restoring_id(None);
                    result?;
                    if let Some(ids) = self.node_mut(node)?.content.item_ids_mut() {
                        ids.unmark_as_deleted(id);
                    }
                }
            }
        }
        Ok(())
    }

    /// True if the live item with this id carries a value override.
    fn is_id_overridden(&self, node: NodeId, id: ItemId) -> Result<bool> {
        Ok(self
            .node(node)?
            .content
            .item_overrides()
            .get(&id)
            .is_some_and(|t| t.is_new()))
    }

    /// Member children plus reference targets of a node, in traversal order.
    fn child_targets(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let node_ref = self.node(node)?;
        let mut targets: Vec<NodeId> = node_ref.children().map(|(_, id)| id).collect();
        let value = node_ref.content.value();
        if let Some(target) = value.as_reference() {
            targets.push(target);
        }
        match value {
            Value::Collection(items) => {
                targets.extend(items.iter().filter_map(|v| v.as_reference()));
            }
            Value::Dictionary(entries) => {
                targets.extend(entries.values().filter_map(|v| v.as_reference()));
            }
            _ => {}
        }
        Ok(targets)
    }
}
