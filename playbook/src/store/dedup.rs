//! Order-preserving record deduplication.

use crate::core::value::canonical_json;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Identity text used for records that lack the dedup key.
const MISSING_KEY: &str = "undefined";

/// Tracks record identities seen so far.
///
/// Identities are stored as SHA-256 digests of their canonical JSON, so the
/// seen-set costs 32 bytes per distinct record however large the records are.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    key: Option<String>,
    seen: HashSet<[u8; 32]>,
}

impl Deduplicator {
    /// Creates a deduplicator keyed on `key`, or on the whole record when
    /// `key` is `None`.
    #[must_use]
    pub fn new(key: Option<&str>) -> Self {
        Self {
            key: key.map(str::to_string),
            seen: HashSet::new(),
        }
    }

    /// Records `record` and returns true if its identity is new.
    pub fn insert(&mut self, record: &Value) -> bool {
        let digest = self.identity(record);
        self.seen.insert(digest)
    }

    /// Number of distinct identities seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn identity(&self, record: &Value) -> [u8; 32] {
        let text = match &self.key {
            Some(key) => record
                .get(key.as_str())
                .map_or_else(|| MISSING_KEY.to_string(), canonical_json),
            None => canonical_json(record),
        };
        Sha256::digest(text.as_bytes()).into()
    }
}

/// Returns the first occurrence of each distinct record, in input order.
#[must_use]
pub fn dedup(records: &[Value], key: Option<&str>) -> Vec<Value> {
    let mut seen = Deduplicator::new(key);
    records
        .iter()
        .filter(|record| seen.insert(record))
        .cloned()
        .collect()
}
