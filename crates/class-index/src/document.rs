//! Order-preserving view of the mapping document.
//!
//! `serde_json::Value` collapses repeated keys, which would hide duplicate
//! class names, so the document is read into this tree instead.

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::fmt;

use crate::ConfigError;

/// Key under which training checkpoints nest the mapping
pub const WRAPPER_KEY: &str = "class_to_idx";

/// A parsed JSON node, reduced to what the loader cares about
#[derive(Debug)]
pub(crate) enum Node {
    /// Object entries in document order, repeats included
    Map(Vec<(String, Node)>),
    /// Non-negative integer
    Index(u64),
    /// Anything else, described by kind
    Other(&'static str),
}

impl Node {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Node::Map(_) => "an object",
            Node::Index(_) => "an integer",
            Node::Other(kind) => kind,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Index(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(u64::try_from(v)
            .map(Node::Index)
            .unwrap_or(Node::Other("a negative integer")))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Node, E> {
        Ok(Node::Other("a floating point number"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Node, E> {
        Ok(Node::Other("a boolean"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Node, E> {
        Ok(Node::Other("a string"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Other("null"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Node::Other("an array"))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.push((key, value));
        }
        Ok(Node::Map(entries))
    }
}

/// Pick the nested mapping if the document wraps one, else use the root
pub(crate) fn unwrap_mapping(
    entries: Vec<(String, Node)>,
) -> Result<Vec<(String, Node)>, ConfigError> {
    let mut nested = None;
    let mut root = Vec::with_capacity(entries.len());

    for (key, node) in entries {
        match node {
            Node::Map(inner) if key == WRAPPER_KEY => {
                if nested.replace(inner).is_some() {
                    return Err(ConfigError::DuplicateName(WRAPPER_KEY.to_string()));
                }
            }
            node => root.push((key, node)),
        }
    }

    Ok(nested.unwrap_or(root))
}
