//! Stable item identities for collection and dictionary contents.
//!
//! Every element of an identity-tracked collection carries an opaque
//! [`ItemId`] that survives inserts, removals, and reorders. The [`ItemIds`]
//! registry maintains the id ↔ position mapping for one content, and keeps
//! removed-but-remembered ids in a deleted set so that a later restoration of
//! "the same" element can be recognized, and so that a deletion can itself be
//! recorded as an override.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::value::Value;

pub mod errors;
pub use errors::IdentityError;

/// Opaque, globally-unique identity of one collection or dictionary element.
///
/// An `ItemId` is independent of the element's current position or key; the
/// registry keeps the mapping recoverable across structural edits. There is
/// no sentinel "empty" id; absence is `Option<ItemId>` at API boundaries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Mints a fresh, globally-unique item id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses one element inside a content.
///
/// `Empty` addresses the content itself, `Position` an element of an ordered
/// collection, `Key` an entry of a dictionary.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Index {
    /// Content-level: no element addressed.
    Empty,
    /// Integer position in an ordered collection.
    Position(usize),
    /// Key of a dictionary entry.
    Key(String),
}

impl Index {
    /// True if this index addresses the content itself.
    pub fn is_empty(&self) -> bool {
        matches!(self, Index::Empty)
    }

    /// The integer position, if this is a `Position` index.
    pub fn position(&self) -> Option<usize> {
        match self {
            Index::Position(p) => Some(*p),
            _ => None,
        }
    }

    /// The key, if this is a `Key` index.
    pub fn key(&self) -> Option<&str> {
        match self {
            Index::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Empty => write!(f, "(content)"),
            Index::Position(p) => write!(f, "{p}"),
            Index::Key(k) => write!(f, "{k:?}"),
        }
    }
}

impl From<usize> for Index {
    fn from(p: usize) -> Self {
        Index::Position(p)
    }
}

impl From<&str> for Index {
    fn from(k: &str) -> Self {
        Index::Key(k.to_string())
    }
}

impl From<String> for Index {
    fn from(k: String) -> Self {
        Index::Key(k)
    }
}

/// Item identity registry for one content's collection or dictionary value.
///
/// Maintains the live mapping from position/key to [`ItemId`], plus the set
/// of deleted-but-remembered ids. At most one position or key maps to a given
/// live id, and ids are never reused while still remembered as deleted.
///
/// # Examples
///
/// ```
/// use lineage::{Index, ItemIds};
///
/// let mut ids = ItemIds::new();
/// let a = ids.push();
/// let b = ids.push();
///
/// assert_eq!(ids.index_of(a), Some(Index::Position(0)));
///
/// // Removing with `mark = true` remembers the id as deleted.
/// let removed = ids.delete_and_shift(0, true).unwrap();
/// assert_eq!(removed, a);
/// assert!(ids.is_deleted(a));
/// assert_eq!(ids.index_of(b), Some(Index::Position(0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ItemIds {
    /// Live mapping from position/key to id. `Index::Empty` is never a key.
    /// Serialized as entry pairs: JSON map keys must be strings.
    #[serde(with = "live_entries")]
    live: BTreeMap<Index, ItemId>,
    /// Removed-but-remembered ids.
    deleted: HashSet<ItemId>,
}

mod live_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Index, ItemId};

    pub fn serialize<S: Serializer>(
        live: &BTreeMap<Index, ItemId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<(&Index, &ItemId)> = live.iter().collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Index, ItemId>, D::Error> {
        let entries: Vec<(Index, ItemId)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl ItemIds {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True if the registry has no live entries.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// The id registered at the given index, if any.
    pub fn id_at(&self, index: &Index) -> Option<ItemId> {
        self.live.get(index).copied()
    }

    /// The current index of a live id, if any.
    pub fn index_of(&self, id: ItemId) -> Option<Index> {
        self.live
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.clone())
    }

    /// True if the id is currently live.
    pub fn contains(&self, id: ItemId) -> bool {
        self.live.values().any(|v| *v == id)
    }

    /// Registers a fresh id at the next free position and returns it.
    pub fn push(&mut self) -> ItemId {
        let id = ItemId::new();
        let position = self.next_position();
        self.live.insert(Index::Position(position), id);
        id
    }

    /// Registers `id` at `position`, shifting every subsequent tracked
    /// position up by one.
    pub fn insert(&mut self, position: usize, id: ItemId) {
        let mut shifted = BTreeMap::new();
        for (index, existing) in std::mem::take(&mut self.live) {
            match index {
                Index::Position(p) if p >= position => {
                    shifted.insert(Index::Position(p + 1), existing);
                }
                other => {
                    shifted.insert(other, existing);
                }
            }
        }
        shifted.insert(Index::Position(position), id);
        self.live = shifted;
    }

    /// Registers `id` under a dictionary key.
    pub fn set_key(&mut self, key: impl Into<String>, id: ItemId) {
        self.live.insert(Index::Key(key.into()), id);
    }

    /// Removes the live id at `index` and returns it.
    ///
    /// With `mark = true` the id moves into the deleted set; with `false` it
    /// is forgotten entirely (the unmark path). Positions are not shifted;
    /// use [`ItemIds::delete_and_shift`] for ordered collections.
    pub fn delete(&mut self, index: &Index, mark: bool) -> Option<ItemId> {
        let id = self.live.remove(index)?;
        if mark {
            self.deleted.insert(id);
        }
        Some(id)
    }

    /// Removes the live id at `position` and decrements every subsequent
    /// tracked position, preserving the position mapping of ordered
    /// collections.
    pub fn delete_and_shift(&mut self, position: usize, mark: bool) -> Option<ItemId> {
        let id = self.live.remove(&Index::Position(position))?;
        let mut shifted = BTreeMap::new();
        for (index, existing) in std::mem::take(&mut self.live) {
            match index {
                Index::Position(p) if p > position => {
                    shifted.insert(Index::Position(p - 1), existing);
                }
                other => {
                    shifted.insert(other, existing);
                }
            }
        }
        self.live = shifted;
        if mark {
            self.deleted.insert(id);
        }
        Some(id)
    }

    /// True if the id is in the deleted set.
    pub fn is_deleted(&self, id: ItemId) -> bool {
        self.deleted.contains(&id)
    }

    /// Moves an id into the deleted set.
    pub fn mark_as_deleted(&mut self, id: ItemId) {
        self.deleted.insert(id);
    }

    /// Removes an id from the deleted set.
    pub fn unmark_as_deleted(&mut self, id: ItemId) {
        self.deleted.remove(&id);
    }

    /// Drops live entries whose index no longer addresses an element of
    /// `value`. Returns the number of entries dropped.
    ///
    /// Used after a content value is replaced wholesale: entries past the
    /// new collection's length (or under vanished keys) are stale, and
    /// dropping them is not a deletion.
    pub fn retain_addressable(&mut self, value: &Value) -> usize {
        let before = self.live.len();
        self.live.retain(|index, _| value.item(index).is_some());
        before - self.live.len()
    }

    /// The single id live in `other` that this registry neither tracks live
    /// nor remembers as deleted. Returns `None` unless exactly one such id
    /// exists.
    ///
    /// Used to discover the id a just-performed `Add` created (diffing a
    /// before snapshot against the after state), and to adopt the id a base
    /// collection just minted.
    pub fn find_missing_id(&self, other: &ItemIds) -> Option<ItemId> {
        let known: HashSet<ItemId> = self.live.values().copied().chain(self.deleted.iter().copied()).collect();
        let mut missing = other.live.values().filter(|id| !known.contains(id));
        let first = missing.next().copied();
        match missing.next() {
            Some(_) => None,
            None => first,
        }
    }

    /// All ids live in `other` that are not live here.
    ///
    /// Deleted sets are ignored on both sides: this is the raw live-set
    /// difference used for removal correspondence.
    pub fn find_missing_ids(&self, other: &ItemIds) -> Vec<ItemId> {
        let live: HashSet<ItemId> = self.live.values().copied().collect();
        other
            .live
            .values()
            .filter(|id| !live.contains(id))
            .copied()
            .collect()
    }

    /// Assigns a fresh id to every element of `value` that has no registered
    /// id yet, in enumeration order. Returns the number of ids assigned.
    pub fn ensure(&mut self, value: &Value) -> usize {
        let mut assigned = 0;
        match value {
            Value::Collection(items) => {
                for position in 0..items.len() {
                    let index = Index::Position(position);
                    if !self.live.contains_key(&index) {
                        self.live.insert(index, ItemId::new());
                        assigned += 1;
                    }
                }
            }
            Value::Dictionary(entries) => {
                for key in entries.keys() {
                    let index = Index::Key(key.clone());
                    if !self.live.contains_key(&index) {
                        self.live.insert(index, ItemId::new());
                        assigned += 1;
                    }
                }
            }
            _ => {}
        }
        assigned
    }

    /// Iterates over live (index, id) pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&Index, ItemId)> {
        self.live.iter().map(|(k, v)| (k, *v))
    }

    /// Iterates over live ids in index order.
    pub fn live_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.live.values().copied()
    }

    fn next_position(&self) -> usize {
        self.live
            .keys()
            .filter_map(|k| k.position())
            .map(|p| p + 1)
            .max()
            .unwrap_or(0)
    }
}
