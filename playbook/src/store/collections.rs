//! Named in-memory collections.

use crate::core::value::lookup_path;
use serde_json::Value;
use std::collections::HashMap;

/// Named, insertion-ordered record lists.
///
/// A collection is always replaced as a whole by [`CollectionStore::set`];
/// there is no per-record mutation.
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    collections: HashMap<String, Vec<Value>>,
}

impl CollectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the named collection and returns its new length.
    pub fn set(&mut self, name: impl Into<String>, items: Vec<Value>) -> usize {
        let count = items.len();
        self.collections.insert(name.into(), items);
        count
    }

    /// Returns the named collection.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Returns true if the named collection exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Removes the named collection, returning its records.
    pub fn release(&mut self, name: &str) -> Option<Vec<Value>> {
        self.collections.remove(name)
    }

    /// Removes every collection.
    pub fn clear(&mut self) {
        self.collections.clear();
    }

    /// Number of collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns true when no collections exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Total number of records across all collections.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Returns spare capacity to the allocator.
    pub fn shrink_to_fit(&mut self) {
        for items in self.collections.values_mut() {
            items.shrink_to_fit();
        }
        self.collections.shrink_to_fit();
    }

    /// Resolves `name[.field...]` for the `collections.` namespace.
    ///
    /// `name` alone yields the whole collection, `name.length` its length and
    /// `name.<n>` the n-th record, with any further segments looked up
    /// inside that record.
    #[must_use]
    pub fn lookup(&self, segments: &[String]) -> Option<Value> {
        let (name, rest) = segments.split_first()?;
        let items = self.collections.get(name)?;

        match rest.split_first() {
            None => Some(Value::Array(items.clone())),
            Some((field, tail)) if field == "length" && tail.is_empty() => {
                Some(Value::from(items.len()))
            }
            Some((field, tail)) => {
                let index = field.parse::<usize>().ok()?;
                items.get(index).and_then(|record| lookup_path(record, tail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segs(path: &str) -> Vec<String> {
        path.split('.').map(String::from).collect()
    }

    #[test]
    fn test_set_replaces() {
        let mut store = CollectionStore::new();
        assert_eq!(store.set("leads", vec![json!(1), json!(2)]), 2);
        assert_eq!(store.set("leads", vec![json!(3)]), 1);
        assert_eq!(store.get("leads"), Some(&[json!(3)][..]));
    }

    #[test]
    fn test_lookup_fields() {
        let mut store = CollectionStore::new();
        store.set("leads", vec![json!({"email": "a@x"}), json!({"email": "b@x"})]);

        assert_eq!(store.lookup(&segs("leads.length")), Some(json!(2)));
        assert_eq!(store.lookup(&segs("leads.1.email")), Some(json!("b@x")));
        assert_eq!(store.lookup(&segs("leads")), Some(json!([{"email": "a@x"}, {"email": "b@x"}])));
        assert_eq!(store.lookup(&segs("leads.email")), None);
        assert_eq!(store.lookup(&segs("missing.length")), None);
    }

    #[test]
    fn test_release_and_clear() {
        let mut store = CollectionStore::new();
        store.set("a", vec![json!(1)]);
        store.set("b", vec![json!(2), json!(3)]);
        assert_eq!(store.total_items(), 3);

        assert_eq!(store.release("a"), Some(vec![json!(1)]));
        assert!(!store.contains("a"));
        assert_eq!(store.release("a"), None);

        store.clear();
        assert!(store.is_empty());
    }
}
