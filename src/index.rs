//! Index model: the scope/value tree the decoder produces.
//!
//! Each entry records the byte offset where its payload begins, so a
//! consumer can seek a [`Reader`](crate::reader::Reader) back to it and read
//! the value with the primitive matching the recorded shape.

use crate::{header::Shape, layout::StructuredTypeLayout};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Derive the identifier for a dotted entry path (`"a.b.c"`; the root path
/// is the empty string).
///
/// The id is the first eight bytes of the SHA-256 digest of the path,
/// little-endian, so equal paths always map to equal ids.
pub fn path_id(path: &str) -> u64 {
    let digest = Sha256::digest(path.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// An index entry representing a value.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueEntry {
    /// Field name.
    pub name: String,
    /// Identifier derived from the entry's dotted path.
    pub id: u64,
    /// Byte offset of the value payload, immediately after its header (or
    /// its inline size prefix in identifier-less contexts).
    pub offset: u64,
    /// The value's shape, as recorded from its header or declared layout.
    pub shape: Shape,
}

/// An index entry representing a scope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeEntry {
    /// Scope name; empty for the root.
    pub name: String,
    /// Identifier derived from the entry's dotted path.
    pub id: u64,
    /// Byte offset where the scope's contents begin.
    pub offset: u64,
    /// Layout name for a structured object; `None` for unstructured scopes
    /// and the root.
    pub type_id: Option<String>,
    /// Child scopes, in stream order.
    pub subscopes: Vec<ScopeEntry>,
    /// Child values, in stream order.
    pub subvalues: Vec<ValueEntry>,
}

impl ScopeEntry {
    /// Find a direct child scope by name.
    pub fn subscope(&self, name: &str) -> Option<&ScopeEntry> {
        self.subscopes.iter().find(|scope| scope.name == name)
    }

    /// Find a direct child value by name.
    pub fn subvalue(&self, name: &str) -> Option<&ValueEntry> {
        self.subvalues.iter().find(|value| value.name == name)
    }
}

/// The structure of a fully parsed stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Index {
    /// Declared structured object layouts, keyed by type id.
    pub types: BTreeMap<String, StructuredTypeLayout>,
    /// The implicit root scope.
    pub root: ScopeEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TypeTag;

    #[test]
    fn test_path_id_deterministic() {
        assert_eq!(path_id("a.b.c"), path_id("a.b.c"));
        assert_eq!(path_id(""), path_id(""));
        assert_ne!(path_id("a.b.c"), path_id("a.b.d"));
        assert_ne!(path_id("a"), path_id(""));
        assert_ne!(path_id("a.b"), path_id("ab"));
    }

    #[test]
    fn test_finders() {
        let root = ScopeEntry {
            name: String::new(),
            id: path_id(""),
            offset: 0,
            type_id: None,
            subscopes: vec![ScopeEntry {
                name: "inner".into(),
                id: path_id("inner"),
                ..Default::default()
            }],
            subvalues: vec![ValueEntry {
                name: "flag".into(),
                id: path_id("flag"),
                offset: 9,
                shape: Shape::Scalar(TypeTag::Boolean),
            }],
        };
        assert_eq!(root.subscope("inner").unwrap().name, "inner");
        assert!(root.subscope("missing").is_none());
        assert_eq!(root.subvalue("flag").unwrap().offset, 9);
        assert!(root.subvalue("missing").is_none());
    }
}
