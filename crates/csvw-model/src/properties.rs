//! Common- and at-property handling for description objects.
//!
//! CSVW description objects mix three kinds of keys: `@`-prefixed
//! annotations, namespaced "common properties" (any key containing `:`),
//! and the declared fields of the description itself. The partition rules
//! live here so every description parses them the same way.

use indexmap::IndexMap;
use serde_json::Value as Json;

/// The non-declared properties of a description object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// Namespaced common properties, in document order.
    pub common: IndexMap<String, Json>,
    /// `@`-properties with the marker stripped, in document order.
    pub at: IndexMap<String, Json>,
}

impl Properties {
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.at.is_empty()
    }

    /// Serialized entries: at-properties first (sorted, `@` re-attached),
    /// then common properties (sorted).
    pub fn entries(&self) -> Vec<(String, Json)> {
        let mut out = Vec::with_capacity(self.at.len() + self.common.len());
        let mut at: Vec<_> = self.at.iter().collect();
        at.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in at {
            out.push((format!("@{k}"), v.clone()));
        }
        let mut common: Vec<_> = self.common.iter().collect();
        common.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in common {
            out.push((k.clone(), v.clone()));
        }
        out
    }
}

/// Split a raw description object into at-properties, common properties,
/// and the remaining declared fields (in document order).
pub fn partition(obj: &serde_json::Map<String, Json>) -> (Properties, IndexMap<String, Json>) {
    let mut props = Properties::default();
    let mut declared = IndexMap::new();
    for (key, value) in obj {
        if let Some(stripped) = key.strip_prefix('@') {
            props.at.insert(stripped.to_string(), value.clone());
        } else if key.contains(':') {
            props.common.insert(key.clone(), value.clone());
        } else {
            declared.insert(key.clone(), value.clone());
        }
    }
    (props, declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partition_key_shapes() {
        let obj = json!({"@id": "x", "dc:type": "", "base": "string"});
        let (props, declared) = partition(obj.as_object().unwrap());
        assert_eq!(props.at.get("id"), Some(&json!("x")));
        assert_eq!(props.common.get("dc:type"), Some(&json!("")));
        assert_eq!(declared.get("base"), Some(&json!("string")));
    }

    #[test]
    fn entries_sorted_with_marker() {
        let obj = json!({"@type": "Table", "@id": "x", "dc:b": 1, "dc:a": 2});
        let (props, _) = partition(obj.as_object().unwrap());
        let keys: Vec<String> = props.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["@id", "@type", "dc:a", "dc:b"]);
    }
}
