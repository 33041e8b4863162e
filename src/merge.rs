//! Deep merge of layered configuration documents.
//!
//! Later documents override earlier ones. Mappings merge recursively,
//! sequences are replaced wholesale, and mixed-shape collisions take the
//! later value. Keys keep the position of their first appearance; new keys
//! append in document order.

use crate::value::Value;
use indexmap::map::Entry;
use indexmap::IndexMap;

/// Merge an ordered list of mapping documents into one mapping.
pub fn merge_documents(documents: Vec<Value>) -> Value {
    let mut merged = Value::mapping();
    for document in documents {
        merged = merge_value(merged, document);
    }
    merged
}

fn merge_value(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged: IndexMap<String, Value> = base_map;
            for (key, overlay_value) in overlay_map {
                match merged.entry(key) {
                    Entry::Occupied(mut entry) => {
                        let current = std::mem::replace(entry.get_mut(), Value::Null);
                        *entry.get_mut() = merge_value(current, overlay_value);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(overlay_value);
                    }
                }
            }
            Value::Mapping(merged)
        }
        // Sequences replace rather than concatenate; every other collision
        // is last-writer-wins as well.
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Value {
        let doc: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        Value::try_from(doc).unwrap()
    }

    #[test]
    fn test_mapping_merge_recurses() {
        let merged = merge_documents(vec![
            parse("a: {x: 1, y: 2}"),
            parse("a: {y: 20, z: 30}"),
        ]);
        assert_eq!(merged, parse("a: {x: 1, y: 20, z: 30}"));
    }

    #[test]
    fn test_sequences_replace() {
        let merged = merge_documents(vec![parse("tags: [a, b, c]"), parse("tags: [d]")]);
        assert_eq!(merged, parse("tags: [d]"));
    }

    #[test]
    fn test_mixed_shapes_later_wins() {
        let merged = merge_documents(vec![parse("v: {a: 1}"), parse("v: scalar")]);
        assert_eq!(merged, parse("v: scalar"));
        let merged = merge_documents(vec![parse("v: scalar"), parse("v: {a: 1}")]);
        assert_eq!(merged, parse("v: {a: 1}"));
    }

    #[test]
    fn test_key_order_base_first_then_new() {
        let merged = merge_documents(vec![parse("a: 1\nb: 2\n"), parse("b: 3\nc: 4\n")]);
        let keys: Vec<&str> = merged
            .as_mapping()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_associative_on_disjoint_keys() {
        let a = parse("a: 1");
        let b = parse("b: 2");
        let c = parse("c: 3");
        let left = merge_documents(vec![
            merge_documents(vec![a.clone(), b.clone()]),
            c.clone(),
        ]);
        let right = merge_documents(vec![a, merge_documents(vec![b, c])]);
        assert_eq!(left, right);
    }
}
