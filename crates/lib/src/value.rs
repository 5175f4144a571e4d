//! Runtime value types for graph contents.
//!
//! This module provides the [`Value`] enum that represents everything a
//! content can hold: plain leaf values, ordered collections, keyed
//! dictionaries, and references to other nodes in the graph. The shape of a
//! value (plain / collection / dictionary) drives which operations a content
//! supports.

use std::collections::BTreeMap;
use std::fmt;

use crate::graph::NodeId;
use crate::identity::Index;

/// Shape classification for a [`Value`], as seen by content operations.
///
/// A content's shape decides which mutations are legal: `Add`/`Remove` only
/// make sense on [`Shape::Collection`] and [`Shape::Dictionary`] contents,
/// and indexed access requires a non-plain shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Shape {
    /// A single value with no addressable elements.
    Plain,
    /// An ordered, index-addressable collection.
    Collection,
    /// A key-addressable dictionary.
    Dictionary,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Plain => write!(f, "plain"),
            Shape::Collection => write!(f, "collection"),
            Shape::Dictionary => write!(f, "dictionary"),
        }
    }
}

/// Values that can be stored in a graph content.
///
/// `Value` represents all data a node's content can wrap. Leaf values are
/// terminal; `Collection` and `Dictionary` hold addressable elements; a
/// `Reference` is a graph edge pointing at another node instead of holding
/// its value inline.
///
/// # Direct Comparisons
///
/// `Value` implements `PartialEq` against primitives for ergonomic
/// assertions:
///
/// ```
/// # use lineage::Value;
/// let text = Value::Text("hello".to_string());
/// let number = Value::Int(42);
///
/// assert!(text == "hello");
/// assert!(number == 42);
/// assert!(!(text == 42));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// Null/empty value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// Ordered collection of values.
    Collection(Vec<Value>),
    /// Key-addressable dictionary of values.
    Dictionary(BTreeMap<String, Value>),
    /// Edge to another node in the graph. The referenced node holds the
    /// actual value; indices over a reference enumerate the indices of the
    /// referenced node's collection or dictionary.
    Reference(NodeId),
}

impl Value {
    /// Classifies this value's shape.
    ///
    /// References classify as [`Shape::Plain`] from the wrapping content's
    /// point of view; callers that need the referenced shape dereference
    /// through the graph first.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Collection(_) => Shape::Collection,
            Value::Dictionary(_) => Shape::Dictionary,
            _ => Shape::Plain,
        }
    }

    /// Number of addressable elements, or `None` for plain values.
    pub fn count(&self) -> Option<usize> {
        match self {
            Value::Collection(items) => Some(items.len()),
            Value::Dictionary(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Dictionary keys in enumeration order; empty for other shapes.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Dictionary(entries) => entries.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Gets the element addressed by `index`, if any.
    pub fn item(&self, index: &Index) -> Option<&Value> {
        match (self, index) {
            (Value::Collection(items), Index::Position(p)) => items.get(*p),
            (Value::Dictionary(entries), Index::Key(k)) => entries.get(k),
            _ => None,
        }
    }

    /// Mutable access to the element addressed by `index`, if any.
    pub fn item_mut(&mut self, index: &Index) -> Option<&mut Value> {
        match (self, index) {
            (Value::Collection(items), Index::Position(p)) => items.get_mut(*p),
            (Value::Dictionary(entries), Index::Key(k)) => entries.get_mut(k),
            _ => None,
        }
    }

    /// Returns the text content if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the referenced node if this is a `Reference` value.
    pub fn as_reference(&self) -> Option<NodeId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Serializes this value to a JSON string.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a value from a JSON string produced by [`Value::to_json`].
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Deep-clones a value for reconciliation with a base graph.
///
/// References are returned as-is: a reference is an edge, not owned data,
/// and must never be cloned through into the target node's value.
pub fn clone_from_base(value: &Value) -> Value {
    match value {
        Value::Reference(id) => Value::Reference(*id),
        other => other.clone(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Collection(items) => write!(f, "[{} items]", items.len()),
            Value::Dictionary(entries) => write!(f, "{{{} entries}}", entries.len()),
            Value::Reference(id) => write!(f, "-> {id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Collection(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Dictionary(entries)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        matches!(self, Value::Bool(b) if b == other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Value::Int(i) if i == other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Value::Text(s) if s == other)
    }
}

impl PartialEq<Value> for bool {
    fn eq(&self, other: &Value) -> bool {
        other == self
    }
}

impl PartialEq<Value> for i64 {
    fn eq(&self, other: &Value) -> bool {
        other == self
    }
}

impl PartialEq<Value> for &str {
    fn eq(&self, other: &Value) -> bool {
        other == self
    }
}
