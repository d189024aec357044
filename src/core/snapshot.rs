//! core::snapshot
//!
//! The entity state captured by a commit.
//!
//! # Design
//!
//! A snapshot maps entity paths (`equipment/AHU-1`, `rooms/101`, ...) to
//! arbitrary JSON values. The engine never interprets the values beyond
//! hashing them and diffing them structurally.
//!
//! # Canonical Form
//!
//! Entity paths live in a `BTreeMap`, and nested objects are re-sorted by key
//! at encoding time, so the compact JSON encoding is canonical: equal
//! snapshots always produce equal bytes and therefore equal content hashes.
//!
//! # Example
//!
//! ```
//! use strata::core::snapshot::Snapshot;
//! use serde_json::json;
//!
//! let mut a = Snapshot::new();
//! a.insert("rooms/101", json!({"area": 42, "name": "Lab"}));
//!
//! let mut b = Snapshot::new();
//! b.insert("rooms/101", json!({"name": "Lab", "area": 42}));
//!
//! assert_eq!(a.canonical_bytes(), b.canonical_bytes());
//! ```

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Entity snapshot keyed by entity path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entities: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, returning the previous value.
    pub fn insert(&mut self, path: impl Into<String>, value: Value) -> Option<Value> {
        self.entities.insert(path.into(), value)
    }

    /// Remove an entity, returning its value.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.entities.remove(path)
    }

    /// Look up an entity by path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entities.get(path)
    }

    /// Iterate entities in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entity paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The canonical byte encoding used for content hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canonical: BTreeMap<&str, Canonical<'_>> = self
            .entities
            .iter()
            .map(|(k, v)| (k.as_str(), Canonical(v)))
            .collect();
        // String keys and JSON values always serialize.
        serde_json::to_vec(&canonical).unwrap_or_default()
    }

    /// Parse a snapshot from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the input is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

/// Serializes a JSON value with object keys in sorted order regardless of
/// how the underlying map stores them.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    out.serialize_entry(k, &Canonical(v))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_ignore_insertion_order() {
        let mut a = Snapshot::new();
        a.insert("floors/1", json!({"level": 1}));
        a.insert("equipment/AHU-1", json!({"cfm": 1200, "model": "X"}));

        let mut b = Snapshot::new();
        b.insert("equipment/AHU-1", json!({"model": "X", "cfm": 1200}));
        b.insert("floors/1", json!({"level": 1}));

        assert_eq!(a, b);
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn from_json_requires_object() {
        assert!(Snapshot::from_json(r#"{"rooms/1": {"area": 10}}"#).is_ok());
        assert!(Snapshot::from_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn insert_remove() {
        let mut snap = Snapshot::new();
        assert!(snap.is_empty());
        assert!(snap.insert("rooms/1", json!(1)).is_none());
        assert_eq!(snap.insert("rooms/1", json!(2)), Some(json!(1)));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.remove("rooms/1"), Some(json!(2)));
        assert!(snap.get("rooms/1").is_none());
    }

    #[test]
    fn empty_snapshot_is_empty_object() {
        assert_eq!(Snapshot::new().canonical_bytes(), b"{}".to_vec());
    }
}
