//! Arena-backed msgpack document.
//!
//! The metadata tree is stored as a flat vector of [`Node`] values addressed
//! by [`NodeId`] handles. Containers hold child handles rather than owned
//! children, so a handle stays valid and unique for the lifetime of the
//! document and can be cached by the caller.
//!
//! ## Conversions
//!
//! Container accessors convert on demand: asking for a map entry on a node
//! that is not a map turns it into an empty map first. Handles to the
//! discarded children stay valid but are no longer reachable from the root.
//!
//! ## Unset entries
//!
//! A freshly created entry holds [`Node::Empty`]. Empty map entries are
//! filtered out when the document is written, so creating a slot without
//! assigning it leaves no trace in the output.
//!
//! ## Key order
//!
//! In memory, map entries keep the order in which they were issued. On write
//! they are emitted sorted by key, so the encoded bytes depend only on the
//! document's contents and not on the order stages were built in.

use std::fmt;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{ConfigError, Result};

/// Handle to a node in a [`Document`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dynamically typed document value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// Placeholder for an entry that has not been assigned yet
    #[default]
    Empty,
    Nil,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Str(String),
    Array(Vec<NodeId>),
    Map(Vec<(String, NodeId)>),
}

impl Node {
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Node::UInt(v) => Some(*v),
            Node::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<u32> for Node {
    fn from(value: u32) -> Self {
        Node::UInt(value as u64)
    }
}

impl From<u64> for Node {
    fn from(value: u64) -> Self {
        Node::UInt(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Int(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Str(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Str(value)
    }
}

/// Hierarchical metadata document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create a document holding only an empty root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Empty],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Total number of nodes allocated, reachable or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Replace the value of a node.
    pub fn set(&mut self, id: NodeId, value: impl Into<Node>) {
        self.nodes[id.index()] = value.into();
    }

    /// Turn `id` into a map unless it already is one.
    pub fn make_map(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        if !matches!(node, Node::Map(_)) {
            *node = Node::Map(Vec::new());
        }
    }

    /// Turn `id` into an array unless it already is one.
    pub fn make_array(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        if !matches!(node, Node::Array(_)) {
            *node = Node::Array(Vec::new());
        }
    }

    /// Look up `key` in `map` without creating anything.
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        match self.node(map) {
            Node::Map(entries) => entries
                .iter()
                .find(|(entry_key, _)| entry_key == key)
                .map(|(_, id)| *id),
            _ => None,
        }
    }

    /// Follow a chain of map keys from `start`.
    pub fn find(&self, start: NodeId, path: &[&str]) -> Option<NodeId> {
        path.iter().try_fold(start, |node, key| self.get(node, key))
    }

    /// Get the entry for `key` in `map`, creating an empty one if missing.
    pub fn map_entry(&mut self, map: NodeId, key: &str) -> NodeId {
        if let Some(id) = self.get(map, key) {
            return id;
        }
        self.make_map(map);
        let child = self.alloc(Node::Empty);
        if let Node::Map(entries) = &mut self.nodes[map.index()] {
            entries.push((key.to_string(), child));
        }
        child
    }

    /// Assign `value` to `key` in `map`, returning the entry's handle.
    pub fn set_entry(&mut self, map: NodeId, key: &str, value: impl Into<Node>) -> NodeId {
        let entry = self.map_entry(map, key);
        self.set(entry, value);
        entry
    }

    /// Get element `index` of `array`, growing it with empty elements.
    pub fn array_element(&mut self, array: NodeId, index: usize) -> NodeId {
        self.make_array(array);
        while self.array_len(array) <= index {
            let child = self.alloc(Node::Empty);
            if let Node::Array(items) = &mut self.nodes[array.index()] {
                items.push(child);
            }
        }
        self.elements(array)[index]
    }

    /// Append `value` to `array`.
    pub fn push(&mut self, array: NodeId, value: impl Into<Node>) -> NodeId {
        self.make_array(array);
        let child = self.alloc(value.into());
        if let Node::Array(items) = &mut self.nodes[array.index()] {
            items.push(child);
        }
        child
    }

    pub fn element(&self, array: NodeId, index: usize) -> Option<NodeId> {
        match self.node(array) {
            Node::Array(items) => items.get(index).copied(),
            _ => None,
        }
    }

    pub fn elements(&self, array: NodeId) -> &[NodeId] {
        match self.node(array) {
            Node::Array(items) => items,
            _ => &[],
        }
    }

    fn array_len(&self, array: NodeId) -> usize {
        self.elements(array).len()
    }

    /// Keys of `map` whose values are set, in issue order.
    pub fn keys(&self, map: NodeId) -> Vec<&str> {
        match self.node(map) {
            Node::Map(entries) => entries
                .iter()
                .filter(|(_, id)| !self.node(*id).is_empty())
                .map(|(key, _)| key.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Serialize the tree reachable from the root to msgpack.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&NodeRef {
            doc: self,
            id: self.root(),
        })
        .map_err(|e| ConfigError::Encode(e.to_string()))
    }

    /// Read a document back from msgpack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let mut doc = Document::new();
        let mut deserializer = rmp_serde::Deserializer::new(bytes);
        let root = NodeSeed { doc: &mut doc }
            .deserialize(&mut deserializer)
            .map_err(|e| ConfigError::Decode(e.to_string()))?;
        doc.nodes[0] = root;
        Ok(doc)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of a subtree, used for serialization.
struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let doc = self.doc;
        match doc.node(self.id) {
            Node::Empty | Node::Nil => serializer.serialize_unit(),
            Node::Bool(v) => serializer.serialize_bool(*v),
            Node::UInt(v) => serializer.serialize_u64(*v),
            Node::Int(v) => serializer.serialize_i64(*v),
            Node::Str(v) => serializer.serialize_str(v),
            Node::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for &id in items {
                    seq.serialize_element(&NodeRef { doc, id })?;
                }
                seq.end()
            }
            Node::Map(entries) => {
                let mut live: Vec<_> = entries
                    .iter()
                    .filter(|(_, id)| !doc.node(*id).is_empty())
                    .collect();
                live.sort_by(|a, b| a.0.cmp(&b.0));
                let mut map = serializer.serialize_map(Some(live.len()))?;
                for (key, id) in live {
                    map.serialize_entry(key, &NodeRef { doc, id: *id })?;
                }
                map.end()
            }
        }
    }
}

/// Deserializes one value, allocating its children in the document.
struct NodeSeed<'a> {
    doc: &'a mut Document,
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = Node;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Node, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_> {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a msgpack metadata value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        // msgpack does not distinguish signedness for non-negative values
        Ok(match u64::try_from(v) {
            Ok(v) => Node::UInt(v),
            Err(_) => Node::Int(v),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(Node::UInt(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Nil)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Nil)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let doc = self.doc;
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(node) = seq.next_element_seed(NodeSeed { doc: &mut *doc })? {
            items.push(doc.alloc(node));
        }
        Ok(Node::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Node, A::Error> {
        let doc = self.doc;
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<String>()? {
            let node = map.next_value_seed(NodeSeed { doc: &mut *doc })?;
            entries.push((key, doc.alloc(node)));
        }
        Ok(Node::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_entry_is_memoized() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.map_entry(root, ".a");
        let b = doc.map_entry(root, ".a");
        assert_eq!(a, b);
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn scalar_is_converted_to_map_on_demand() {
        let mut doc = Document::new();
        let root = doc.root();
        let entry = doc.set_entry(root, ".x", 5u32);
        let child = doc.set_entry(entry, ".y", true);

        assert!(matches!(doc.node(entry), Node::Map(_)));
        assert_eq!(doc.node(child).as_bool(), Some(true));
    }

    #[test]
    fn array_element_grows_array() {
        let mut doc = Document::new();
        let root = doc.root();
        let array = doc.map_entry(root, "list");
        let third = doc.array_element(array, 2);

        assert_eq!(doc.elements(array).len(), 3);
        assert_eq!(doc.array_element(array, 2), third);
        assert_eq!(doc.element(array, 3), None);
    }

    #[test]
    fn keys_preserve_issue_order_and_skip_unset() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.set_entry(root, "zeta", 1u32);
        doc.map_entry(root, "unset");
        doc.set_entry(root, "alpha", 2u32);

        assert_eq!(doc.keys(root), vec!["zeta", "alpha"]);
    }

    #[test]
    fn find_follows_nested_keys() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.map_entry(root, "outer");
        let leaf = doc.set_entry(outer, "inner", "value");

        assert_eq!(doc.find(root, &["outer", "inner"]), Some(leaf));
        assert_eq!(doc.find(root, &["outer", "missing"]), None);
    }

    #[test]
    fn msgpack_readback_preserves_structure() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.set_entry(root, "name", "pipeline");
        doc.set_entry(root, "negative", -3i64);
        let list = doc.map_entry(root, "hash");
        doc.push(list, 0xdead_beef_u64);
        doc.push(list, 0u64);
        doc.map_entry(root, "unset");

        let bytes = doc.to_msgpack().unwrap();
        let read = Document::from_msgpack(&bytes).unwrap();
        let root = read.root();

        assert_eq!(read.keys(root), vec!["hash", "name", "negative"]);
        let name = read.get(root, "name").unwrap();
        assert_eq!(read.node(name).as_str(), Some("pipeline"));
        let negative = read.get(root, "negative").unwrap();
        assert_eq!(read.node(negative), &Node::Int(-3));
        let hash = read.get(root, "hash").unwrap();
        let first = read.element(hash, 0).unwrap();
        assert_eq!(read.node(first).as_uint(), Some(0xdead_beef));
        assert_eq!(read.get(root, "unset"), None);
    }

    #[test]
    fn encoding_does_not_depend_on_issue_order() {
        let mut first = Document::new();
        let root = first.root();
        first.set_entry(root, ".vertex", 1u32);
        first.set_entry(root, ".pixel", 2u32);
        first.map_entry(root, ".compute");

        let mut second = Document::new();
        let root = second.root();
        second.map_entry(root, ".compute");
        second.set_entry(root, ".pixel", 2u32);
        second.set_entry(root, ".vertex", 1u32);

        assert_eq!(first.keys(first.root()), vec![".vertex", ".pixel"]);
        assert_eq!(first.to_msgpack().unwrap(), second.to_msgpack().unwrap());
    }

    #[test]
    fn msgpack_encodes_small_map_compactly() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.set_entry(root, "a", 1u32);

        // fixmap(1), fixstr(1) "a", positive fixint 1
        assert_eq!(doc.to_msgpack().unwrap(), vec![0x81, 0xa1, b'a', 0x01]);
    }

    #[test]
    fn truncated_msgpack_is_a_decode_error() {
        let result = Document::from_msgpack(&[0x82, 0xa1, b'a']);
        assert!(matches!(result, Err(ConfigError::Decode(_))));
    }
}
