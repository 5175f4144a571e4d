//! Override tracking: deciding, for every mutation, whether it is a local
//! override or an inherited update, and exposing the override query/set
//! surface.
//!
//! Override flags follow an absence-means-inherited discipline: a unit is
//! overridden iff an explicit [`OverrideType::New`] entry exists for it.
//! Resetting a unit to `Base` removes the entry. Deleted items keep their
//! entry so a deletion itself survives as an override, independent of the
//! base's view.

use tracing::{debug, warn};

use crate::Result;
use crate::graph::{ChangeEvent, ChangeKind, Graph, GraphEvent, NodeId, Origin};
use crate::identity::{Index, ItemId, ItemIds};
use crate::identity::errors::IdentityError;
use crate::reconcile::errors::ReconcileError;

/// Override state of one addressable unit.
///
/// Absence of an explicit entry means `Base`; entries exist only while a
/// unit is `New`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum OverrideType {
    /// Inherited from the base.
    #[default]
    Base,
    /// Locally authored.
    New,
}

impl OverrideType {
    /// True if the unit is overridden.
    pub fn is_new(&self) -> bool {
        matches!(self, OverrideType::New)
    }
}

/// Writes an override flag into a map, keeping the absence-means-Base
/// discipline.
fn set_override(
    map: &mut std::collections::HashMap<ItemId, OverrideType>,
    id: ItemId,
    override_type: OverrideType,
) {
    if override_type.is_new() {
        map.insert(id, override_type);
    } else {
        map.remove(&id);
    }
}

impl Graph {
    /// Whether override flags can be written on this node at all.
    fn can_override(&self, node: NodeId) -> Result<bool> {
        let node = self.node(node)?;
        Ok(node.supports_overrides() && node.content().is_overridable())
    }

    /// The node's identity registry, if one exists.
    pub fn try_item_ids(&self, node: NodeId) -> Result<Option<&ItemIds>> {
        Ok(self.node(node)?.content.item_ids())
    }

    /// The node's identity registry, failing if the content has none.
    pub fn item_ids(&self, node: NodeId) -> Result<&ItemIds> {
        let node = self.node(node)?;
        node.content
            .item_ids()
            .ok_or_else(|| {
                IdentityError::MissingIdentity {
                    node: node.name().to_string(),
                }
                .into()
            })
    }

    /// Maps an index to the item id registered there, if any.
    pub fn try_index_to_id(&self, node: NodeId, index: &Index) -> Result<Option<ItemId>> {
        if index.is_empty() {
            return Ok(None);
        }
        Ok(self
            .try_item_ids(node)?
            .and_then(|ids| ids.id_at(index)))
    }

    /// Maps an index to its item id, failing if none is registered.
    pub fn index_to_id(&self, node: NodeId, index: &Index) -> Result<ItemId> {
        self.try_index_to_id(node, index)?.ok_or_else(|| {
            IdentityError::IndexNotFound {
                index: index.clone(),
            }
            .into()
        })
    }

    /// Maps a live item id to its current index, if any.
    pub fn try_id_to_index(&self, node: NodeId, id: ItemId) -> Result<Option<Index>> {
        Ok(self.try_item_ids(node)?.and_then(|ids| ids.index_of(id)))
    }

    /// Maps a live item id to its current index, failing if not live.
    pub fn id_to_index(&self, node: NodeId, id: ItemId) -> Result<Index> {
        self.try_id_to_index(node, id)?
            .ok_or_else(|| IdentityError::IdNotFound { id }.into())
    }

    /// True if the id is live in the node's collection.
    pub fn has_id(&self, node: NodeId, id: ItemId) -> Result<bool> {
        Ok(self.try_id_to_index(node, id)?.is_some())
    }

    /// True if the id is remembered as deleted.
    pub fn is_item_deleted(&self, node: NodeId, id: ItemId) -> Result<bool> {
        Ok(self.item_ids(node)?.is_deleted(id))
    }

    /// Sets or clears the content-level override flag.
    ///
    /// No-op when the node is marked non-overridable.
    pub fn override_content(&mut self, node: NodeId, is_overridden: bool) -> Result<()> {
        if !self.can_override(node)? {
            return Ok(());
        }
        self.dispatch(GraphEvent::OverrideChanging { node });
        let override_type = if is_overridden {
            OverrideType::New
        } else {
            OverrideType::Base
        };
        self.node_mut(node)?.content.set_content_override(override_type);
        debug!(node = %node, ?override_type, "content override changed");
        self.dispatch(GraphEvent::OverrideChanged { node });
        Ok(())
    }

    /// Sets or clears the override flag of the item at `index`.
    pub fn override_item(&mut self, node: NodeId, is_overridden: bool, index: &Index) -> Result<()> {
        if !self.can_override(node)? {
            return Ok(());
        }
        let id = self.index_to_id(node, index)?;
        self.dispatch(GraphEvent::OverrideChanging { node });
        let override_type = if is_overridden {
            OverrideType::New
        } else {
            OverrideType::Base
        };
        set_override(
            self.node_mut(node)?.content.item_overrides_mut(),
            id,
            override_type,
        );
        self.dispatch(GraphEvent::OverrideChanged { node });
        Ok(())
    }

    /// Sets or clears the override flag of the dictionary key at `index`.
    pub fn override_key(&mut self, node: NodeId, is_overridden: bool, index: &Index) -> Result<()> {
        if !self.can_override(node)? {
            return Ok(());
        }
        let id = self.index_to_id(node, index)?;
        self.dispatch(GraphEvent::OverrideChanging { node });
        let override_type = if is_overridden {
            OverrideType::New
        } else {
            OverrideType::Base
        };
        set_override(
            self.node_mut(node)?.content.key_overrides_mut(),
            id,
            override_type,
        );
        self.dispatch(GraphEvent::OverrideChanged { node });
        Ok(())
    }

    /// Sets or clears the override flag of a deleted item, toggling the
    /// registry's deleted-mark in lockstep so "override = this item is
    /// deleted" survives independently of the base's view.
    pub fn override_deleted_item(
        &mut self,
        node: NodeId,
        is_overridden: bool,
        id: ItemId,
    ) -> Result<()> {
        if !self.can_override(node)? || self.try_item_ids(node)?.is_none() {
            return Ok(());
        }
        self.dispatch(GraphEvent::OverrideChanging { node });
        let override_type = if is_overridden {
            OverrideType::New
        } else {
            OverrideType::Base
        };
        let content = &mut self.node_mut(node)?.content;
        set_override(content.item_overrides_mut(), id, override_type);
        if let Some(ids) = content.item_ids_mut() {
            if is_overridden {
                ids.mark_as_deleted(id);
            } else {
                ids.unmark_as_deleted(id);
            }
        }
        self.dispatch(GraphEvent::OverrideChanged { node });
        Ok(())
    }

    /// The content-level override flag.
    pub fn content_override(&self, node: NodeId) -> Result<OverrideType> {
        Ok(self.node(node)?.content.content_override())
    }

    /// The override flag of the item at `index` (`Base` when untracked).
    pub fn item_override(&self, node: NodeId, index: &Index) -> Result<OverrideType> {
        let Some(id) = self.try_index_to_id(node, index)? else {
            return Ok(OverrideType::Base);
        };
        Ok(self
            .node(node)?
            .content
            .item_overrides()
            .get(&id)
            .copied()
            .unwrap_or_default())
    }

    /// The override flag of the key at `index` (`Base` when untracked).
    pub fn key_override(&self, node: NodeId, index: &Index) -> Result<OverrideType> {
        let Some(id) = self.try_index_to_id(node, index)? else {
            return Ok(OverrideType::Base);
        };
        Ok(self
            .node(node)?
            .content
            .key_overrides()
            .get(&id)
            .copied()
            .unwrap_or_default())
    }

    /// True if the content itself is overridden.
    pub fn is_content_overridden(&self, node: NodeId) -> Result<bool> {
        Ok(self.content_override(node)?.is_new())
    }

    /// True if the item at `index` is overridden.
    pub fn is_item_overridden(&self, node: NodeId, index: &Index) -> Result<bool> {
        Ok(self.item_override(node, index)?.is_new())
    }

    /// True if the key at `index` is overridden.
    pub fn is_key_overridden(&self, node: NodeId, index: &Index) -> Result<bool> {
        Ok(self.key_override(node, index)?.is_new())
    }

    /// True if the id is deleted and its deletion is an override.
    pub fn is_item_overridden_deleted(&self, node: NodeId, id: ItemId) -> Result<bool> {
        let Some(ids) = self.try_item_ids(node)? else {
            return Ok(false);
        };
        Ok(ids.is_deleted(id)
            && self
                .node(node)?
                .content
                .item_overrides()
                .get(&id)
                .is_some_and(|t| t.is_new()))
    }

    /// True if the content is linked to a base and not overridden.
    pub fn is_content_inherited(&self, node: NodeId) -> Result<bool> {
        Ok(self.node(node)?.base().is_some() && !self.is_content_overridden(node)?)
    }

    /// True if the item is linked to a base and not overridden.
    pub fn is_item_inherited(&self, node: NodeId, index: &Index) -> Result<bool> {
        Ok(self.node(node)?.base().is_some() && !self.is_item_overridden(node, index)?)
    }

    /// True if the key is linked to a base and not overridden.
    pub fn is_key_inherited(&self, node: NodeId, index: &Index) -> Result<bool> {
        Ok(self.node(node)?.base().is_some() && !self.is_key_overridden(node, index)?)
    }

    /// Current indices of all overridden live items. Deleted overrides have
    /// no index and are not included; see
    /// [`Graph::overridden_deleted_ids`].
    pub fn overridden_item_indices(&self, node: NodeId) -> Result<Vec<Index>> {
        let node_ref = self.node(node)?;
        let Some(ids) = node_ref.content.item_ids() else {
            return Ok(Vec::new());
        };
        let mut indices = Vec::new();
        for (id, override_type) in node_ref.content.item_overrides() {
            if override_type.is_new() && !ids.is_deleted(*id)
                && let Some(index) = ids.index_of(*id)
            {
                indices.push(index);
            }
        }
        indices.sort();
        Ok(indices)
    }

    /// Current indices of all overridden dictionary keys.
    pub fn overridden_key_indices(&self, node: NodeId) -> Result<Vec<Index>> {
        let node_ref = self.node(node)?;
        let Some(ids) = node_ref.content.item_ids() else {
            return Ok(Vec::new());
        };
        let mut indices = Vec::new();
        for (id, override_type) in node_ref.content.key_overrides() {
            if override_type.is_new() && !ids.is_deleted(*id)
                && let Some(index) = ids.index_of(*id)
            {
                indices.push(index);
            }
        }
        indices.sort();
        Ok(indices)
    }

    /// Ids whose deletion is an override on this node.
    pub fn overridden_deleted_ids(&self, node: NodeId) -> Result<Vec<ItemId>> {
        let node_ref = self.node(node)?;
        let Some(ids) = node_ref.content.item_ids() else {
            return Ok(Vec::new());
        };
        let mut deleted: Vec<ItemId> = node_ref
            .content
            .item_overrides()
            .iter()
            .filter(|(id, t)| t.is_new() && ids.is_deleted(**id))
            .map(|(id, _)| *id)
            .collect();
        deleted.sort();
        Ok(deleted)
    }

    /// Re-adds a previously deleted item at `index` under its old id.
    ///
    /// The id is unmarked as deleted and reused for the new element, so
    /// override and deletion state round-trip across a delete/restore pair.
    pub fn restore_item(
        &mut self,
        node: NodeId,
        value: crate::value::Value,
        index: Index,
        id: ItemId,
    ) -> Result<()> {
        self.node_mut(node)?.content.set_restoring_id(Some(id));
        let result = self.mutate(
            node,
            crate::graph::Mutation::Add { index, value },
            Origin::Local,
        );
        self.node_mut(node)?.content.set_restoring_id(None);
        result?;
        if let Some(ids) = self.node_mut(node)?.content.item_ids_mut() {
            ids.unmark_as_deleted(id);
        }
        Ok(())
    }

    /// Re-adds a previously deleted item at the end of the collection under
    /// its old id, verifying the registry actually reused it.
    ///
    /// A restore that fails to register a replacement id is an invariant
    /// violation and fails loudly.
    pub fn restore_item_appended(
        &mut self,
        node: NodeId,
        value: crate::value::Value,
        id: ItemId,
    ) -> Result<()> {
        let before = match self.node_mut(node)?.content.item_ids_mut() {
            Some(ids) => {
                ids.unmark_as_deleted(id);
                Some(ids.clone())
            }
            None => None,
        };
        let end = self.retrieve(node)?.count().unwrap_or(0);
        self.node_mut(node)?.content.set_restoring_id(Some(id));
        let result = self.mutate(
            node,
            crate::graph::Mutation::Add {
                index: Index::Position(end),
                value,
            },
            Origin::Local,
        );
        self.node_mut(node)?.content.set_restoring_id(None);
        result?;
        if let (Some(before), Some(after)) = (before, self.try_item_ids(node)?) {
            if before.find_missing_id(after) != Some(id) {
                return Err(ReconcileError::RestoreIdNotGenerated { id }.into());
            }
        }
        Ok(())
    }

    /// Removes the item at `index` and forgets its id entirely, leaving no
    /// deletion override behind.
    pub fn remove_and_discard(&mut self, node: NodeId, index: &Index, id: ItemId) -> Result<()> {
        self.remove_item(node, index)?;
        let content = &mut self.node_mut(node)?.content;
        if let Some(ids) = content.item_ids_mut() {
            ids.unmark_as_deleted(id);
        }
        content.item_overrides_mut().remove(&id);
        Ok(())
    }

    /// The change-reaction algorithm, run by every mutation between the
    /// actual change and the `Changed` event.
    ///
    /// Decides whether the mutation is a local override or an inherited
    /// update, keeps the identity registry in step with the structural
    /// change, and writes the resulting override flags.
    pub(crate) fn react_to_change(&mut self, event: &ChangeEvent, origin: Origin<'_>) -> Result<()> {
        let node_id = event.node;
        if !self.node(node_id)?.content.is_identifiable() {
            // Non-identifiable contents get no identity or override
            // bookkeeping at all.
            return Ok(());
        }

        let is_overriding = origin.is_local();
        let mut removed: Option<ItemId> = None;

        match event.kind {
            ChangeKind::ValueChange => {
                if event.index.is_empty() {
                    // The whole value was replaced; live entries that no
                    // longer address an element are stale, not deleted.
                    let value = self.node(node_id)?.content.value().clone();
                    if let Some(ids) = self.node_mut(node_id)?.content.item_ids_mut() {
                        ids.retain_addressable(&value);
                    }
                }
                self.ensure_item_ids(node_id)?;
            }
            ChangeKind::CollectionAdd => {
                // A pending restore id wins over everything: the caller is
                // reusing a previously-deleted item's identity.
                let restoring = self.node(node_id)?.content.restoring_id();
                let item_id = match (restoring, origin) {
                    (Some(id), _) => id,
                    (None, Origin::Base(base)) => match self.adopt_base_id(node_id, base)? {
                        Some(adopted) => adopted,
                        None => {
                            warn!(node = %node_id, "no base id to adopt for added item, minting a fresh one");
                            ItemId::new()
                        }
                    },
                    (None, Origin::Local) => ItemId::new(),
                };
                if let Some(ids) = self.node_mut(node_id)?.content.item_ids_mut() {
                    match &event.index {
                        Index::Position(p) => ids.insert(*p, item_id),
                        Index::Key(k) => ids.set_key(k.clone(), item_id),
                        Index::Empty => {}
                    }
                }
            }
            ChangeKind::CollectionRemove => {
                if let Some(ids) = self.node_mut(node_id)?.content.item_ids_mut() {
                    removed = match &event.index {
                        Index::Position(p) => ids.delete_and_shift(*p, is_overriding),
                        index @ Index::Key(_) => ids.delete(index, is_overriding),
                        Index::Empty => None,
                    };
                }
            }
        }

        // Container policy: overrides are not recorded when change
        // propagation from base is disabled.
        if !self.propagate_changes_from_base {
            return Ok(());
        }

        if is_overriding && !self.resetting_override {
            match event.kind {
                ChangeKind::CollectionRemove => {
                    if let Some(id) = removed {
                        self.override_deleted_item(node_id, true, id)?;
                    }
                }
                _ => {
                    if event.index.is_empty() {
                        self.override_content(node_id, true)?;
                    } else {
                        self.override_item(node_id, true, &event.index)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The id a mid-update base collection just created, discovered as the
    /// registry difference between this node and its base.
    fn adopt_base_id(&self, node: NodeId, base: &Graph) -> Result<Option<ItemId>> {
        let Some(base_node) = self.node(node)?.base() else {
            return Ok(None);
        };
        let Some(base_ids) = base.node(base_node)?.content.item_ids() else {
            return Ok(None);
        };
        let empty = ItemIds::new();
        let derived_ids = self.node(node)?.content.item_ids().unwrap_or(&empty);
        Ok(derived_ids.find_missing_id(base_ids))
    }
}
