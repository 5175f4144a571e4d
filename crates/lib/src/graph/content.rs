//! Content: the mutable value-holding unit inside a node.

use std::collections::HashMap;

use crate::identity::{ItemId, ItemIds};
use crate::overrides::OverrideType;
use crate::value::{Shape, Value};

/// Static policy for a member, resolved once at content construction.
///
/// Callers with a type-descriptor layer resolve these from member metadata;
/// the graph itself only ever sees the plain booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberPolicy {
    /// Whether collection/dictionary elements of this member carry stable
    /// item identities. Non-identifiable contents get no registry and no
    /// item/key override tracking.
    pub identifiable: bool,
    /// Whether the member participates in override tracking at all.
    pub overridable: bool,
}

impl Default for MemberPolicy {
    fn default() -> Self {
        Self {
            identifiable: true,
            overridable: true,
        }
    }
}

impl MemberPolicy {
    /// Policy for a collection whose items carry no stable identity.
    pub fn non_identifiable() -> Self {
        Self {
            identifiable: false,
            ..Self::default()
        }
    }

    /// Policy for a member that can never be overridden.
    pub fn non_overridable() -> Self {
        Self {
            overridable: false,
            ..Self::default()
        }
    }
}

/// The value-holding unit of a node, together with its identity registry and
/// override bookkeeping.
///
/// Override maps hold entries only while a unit is `New`; absence means
/// `Base` (inherited). Deleted items keep their entry so a deletion itself
/// remains an override.
#[derive(Debug)]
pub struct Content {
    value: Value,
    identifiable: bool,
    overridable: bool,
    /// Lazily created on the first structural touch of an identifiable
    /// collection or dictionary.
    item_ids: Option<ItemIds>,
    content_override: OverrideType,
    item_overrides: HashMap<ItemId, OverrideType>,
    key_overrides: HashMap<ItemId, OverrideType>,
    /// Id to reuse for the next add, set by the restore path.
    restoring_id: Option<ItemId>,
}

impl Content {
    pub(crate) fn new(value: Value, policy: MemberPolicy) -> Self {
        Self {
            value,
            identifiable: policy.identifiable,
            overridable: policy.overridable,
            item_ids: None,
            content_override: OverrideType::Base,
            item_overrides: HashMap::new(),
            key_overrides: HashMap::new(),
            restoring_id: None,
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// The content's shape, as classified from its current value.
    pub fn shape(&self) -> Shape {
        self.value.shape()
    }

    /// Whether elements of this content carry stable item identities.
    pub fn is_identifiable(&self) -> bool {
        self.identifiable
    }

    /// Whether this content participates in override tracking.
    pub fn is_overridable(&self) -> bool {
        self.overridable
    }

    /// The identity registry, if one has been created.
    pub fn item_ids(&self) -> Option<&ItemIds> {
        self.item_ids.as_ref()
    }

    /// The identity registry, creating it empty when the content is
    /// identifiable and its shape supports elements.
    pub(crate) fn item_ids_mut(&mut self) -> Option<&mut ItemIds> {
        if !self.identifiable || self.shape() == Shape::Plain {
            return None;
        }
        Some(self.item_ids.get_or_insert_with(ItemIds::new))
    }

    pub(crate) fn set_item_ids(&mut self, ids: ItemIds) {
        self.item_ids = Some(ids);
    }

    pub(crate) fn content_override(&self) -> OverrideType {
        self.content_override
    }

    pub(crate) fn set_content_override(&mut self, override_type: OverrideType) {
        self.content_override = override_type;
    }

    pub(crate) fn item_overrides(&self) -> &HashMap<ItemId, OverrideType> {
        &self.item_overrides
    }

    pub(crate) fn item_overrides_mut(&mut self) -> &mut HashMap<ItemId, OverrideType> {
        &mut self.item_overrides
    }

    pub(crate) fn key_overrides(&self) -> &HashMap<ItemId, OverrideType> {
        &self.key_overrides
    }

    pub(crate) fn key_overrides_mut(&mut self) -> &mut HashMap<ItemId, OverrideType> {
        &mut self.key_overrides
    }

    pub(crate) fn restoring_id(&self) -> Option<ItemId> {
        self.restoring_id
    }

    pub(crate) fn set_restoring_id(&mut self, id: Option<ItemId>) {
        self.restoring_id = id;
    }
}
