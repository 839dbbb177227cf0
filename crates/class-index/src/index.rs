//! Class Index Implementation

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::document::{unwrap_mapping, Node};
use crate::{ConfigError, LookupError};

/// Immutable mapping between class names and label indices.
///
/// Indices always cover `[0, len)` with no gaps, so the reverse direction is a
/// plain vector lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    /// class name -> index
    forward: HashMap<String, usize>,
    /// index -> class name
    reverse: Vec<String>,
}

impl ClassIndex {
    /// Load a mapping document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading class mapping from {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let index = Self::from_json_str(&text)?;
        info!("Loaded {} classes", index.len());
        Ok(index)
    }

    /// Parse a mapping document.
    ///
    /// Accepts either a flat `{"name": index}` object or one nested under a
    /// top-level `class_to_idx` key.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let root: Node =
            serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let entries = match root {
            Node::Map(entries) => entries,
            other => {
                return Err(ConfigError::Malformed(format!(
                    "expected an object at the document root, found {}",
                    other.kind()
                )))
            }
        };

        let mut pairs = Vec::new();
        for (name, node) in unwrap_mapping(entries)? {
            match node {
                Node::Index(raw) => {
                    let index = usize::try_from(raw).map_err(|_| ConfigError::InvalidIndex {
                        name: name.clone(),
                        found: "an integer too large for this platform",
                    })?;
                    pairs.push((name, index));
                }
                other => {
                    return Err(ConfigError::InvalidIndex {
                        name,
                        found: other.kind(),
                    })
                }
            }
        }

        Self::from_pairs(pairs)
    }

    /// Build from explicit (name, index) pairs
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let pairs: Vec<(String, usize)> = pairs.into_iter().map(|(n, i)| (n.into(), i)).collect();
        if pairs.is_empty() {
            return Err(ConfigError::Empty);
        }

        let len = pairs.len();
        let mut forward = HashMap::with_capacity(len);
        let mut slots: Vec<Option<String>> = vec![None; len];

        for (name, index) in pairs {
            if forward.contains_key(&name) {
                return Err(ConfigError::DuplicateName(name));
            }
            if index >= len {
                return Err(ConfigError::NonContiguous { name, index, len });
            }
            if let Some(first) = &slots[index] {
                return Err(ConfigError::DuplicateIndex {
                    index,
                    first: first.clone(),
                    second: name,
                });
            }
            slots[index] = Some(name.clone());
            forward.insert(name, index);
        }

        // len distinct indices below len fill every slot
        let reverse = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ConfigError::Malformed("index range has gaps".to_string()))?;

        debug!("Class index built with {} entries", reverse.len());
        Ok(Self { forward, reverse })
    }

    /// Build with indices taken from iteration order
    pub fn from_names<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(names.into_iter().enumerate().map(|(i, n)| (n, i)))
    }

    /// Resolve a label index to its class name
    pub fn name_for(&self, index: usize) -> Result<&str, LookupError> {
        self.reverse
            .get(index)
            .map(String::as_str)
            .ok_or(LookupError::OutOfRange {
                index,
                len: self.reverse.len(),
            })
    }

    /// Resolve a class name to its label index
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.forward.get(name).copied()
    }

    /// Verify a score vector lines up with this mapping
    pub fn check_width(&self, width: usize) -> Result<(), LookupError> {
        if width == self.reverse.len() {
            Ok(())
        } else {
            Err(LookupError::WidthMismatch {
                expected: self.reverse.len(),
                actual: width,
            })
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    /// Always false for a successfully built index
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Class names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.reverse.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FLAT: &str = r#"{"rose": 0, "tulip": 1, "daisy": 2}"#;
    const NESTED: &str = r#"{"class_to_idx": {"daisy": 2, "rose": 0, "tulip": 1}, "epoch": 30}"#;

    #[test]
    fn test_flat_and_nested_resolve_identically() {
        let flat = ClassIndex::from_json_str(FLAT).unwrap();
        let nested = ClassIndex::from_json_str(NESTED).unwrap();

        assert_eq!(flat, nested);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat.name_for(0).unwrap(), "rose");
        assert_eq!(flat.name_for(2).unwrap(), "daisy");
        assert_eq!(nested.index_of("tulip"), Some(1));
    }

    #[test]
    fn test_lookup_out_of_range() {
        let index = ClassIndex::from_json_str(FLAT).unwrap();
        assert_eq!(
            index.name_for(3),
            Err(LookupError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(index.index_of("orchid"), None);
    }

    #[test]
    fn test_non_contiguous_indices() {
        let err = ClassIndex::from_json_str(r#"{"rose": 0, "tulip": 2}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NonContiguous { index: 2, len: 2, .. }));
    }

    #[test]
    fn test_duplicate_index() {
        let err = ClassIndex::from_json_str(r#"{"rose": 0, "tulip": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateIndex { index: 0, .. }));
    }

    #[test]
    fn test_duplicate_name() {
        let err = ClassIndex::from_json_str(r#"{"rose": 0, "rose": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(name) if name == "rose"));
    }

    #[test]
    fn test_invalid_index_values() {
        for doc in [
            r#"{"rose": -1}"#,
            r#"{"rose": 0.5}"#,
            r#"{"rose": "0"}"#,
            r#"{"rose": null}"#,
            r#"{"rose": [0]}"#,
        ] {
            let err = ClassIndex::from_json_str(doc).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidIndex { .. }), "{doc}: {err}");
        }
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            ClassIndex::from_json_str("[\"rose\", \"tulip\"]"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ClassIndex::from_json_str("{not json"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(ClassIndex::from_json_str("{}"), Err(ConfigError::Empty)));
        assert!(matches!(
            ClassIndex::from_json_str(r#"{"class_to_idx": {}}"#),
            Err(ConfigError::Empty)
        ));
    }

    #[test]
    fn test_check_width() {
        let index = ClassIndex::from_names(["rose", "tulip"]).unwrap();
        assert!(index.check_width(2).is_ok());
        assert_eq!(
            index.check_width(5),
            Err(LookupError::WidthMismatch { expected: 2, actual: 5 })
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = ClassIndex::load("/nonexistent/class_to_idx.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_round_trip(names in prop::collection::hash_set("[a-z_]{1,16}", 1..64), nest in any::<bool>()) {
            let names: Vec<String> = names.into_iter().collect();
            let mapping: serde_json::Map<String, serde_json::Value> = names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), serde_json::Value::from(i)))
                .collect();
            let doc = if nest {
                serde_json::json!({ "class_to_idx": mapping })
            } else {
                serde_json::Value::Object(mapping)
            };

            let index = ClassIndex::from_json_str(&doc.to_string()).unwrap();
            prop_assert_eq!(index.len(), names.len());

            let mut seen = std::collections::HashSet::new();
            for i in 0..index.len() {
                let name = index.name_for(i).unwrap();
                prop_assert!(seen.insert(name.to_string()));
                prop_assert_eq!(index.index_of(name), Some(i));
            }
        }
    }
}
