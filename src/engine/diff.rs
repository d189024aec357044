//! engine::diff
//!
//! Structural differences between two commit snapshots.
//!
//! Entities present on one side only are reported at the entity path. For
//! entities on both sides, objects are compared key by key (recursing into
//! nested objects, with dotted paths such as `equipment/AHU-1.specs.kw`);
//! arrays and scalars are compared as whole values.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::EngineError;
use crate::core::snapshot::Snapshot;
use crate::core::types::CommitId;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// One difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// Counts per change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut s, e| {
            match e.kind {
                ChangeKind::Added => s.added += 1,
                ChangeKind::Removed => s.removed += 1,
                ChangeKind::Modified => s.modified += 1,
            }
            s
        })
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} modified",
            self.added, self.removed, self.modified
        )
    }
}

/// Compares commits.
pub struct DiffEngine<'a> {
    store: &'a dyn Store,
}

impl<'a> DiffEngine<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Changes from commit `a` to commit `b`, ordered by path.
    pub fn diff(&self, a: CommitId, b: CommitId) -> Result<Vec<DiffEntry>, EngineError> {
        let before = self.store.get_snapshot(a)?;
        if a == b {
            return Ok(Vec::new());
        }
        let after = self.store.get_snapshot(b)?;
        Ok(diff_snapshots(&before, &after))
    }

    pub fn summary(&self, a: CommitId, b: CommitId) -> Result<DiffSummary, EngineError> {
        Ok(DiffSummary::from_entries(&self.diff(a, b)?))
    }
}

/// Compare two snapshots.
pub fn diff_snapshots(before: &Snapshot, after: &Snapshot) -> Vec<DiffEntry> {
    let paths: BTreeSet<&str> = before.paths().chain(after.paths()).collect();
    let mut out = Vec::new();
    for path in paths {
        diff_value(path.to_string(), before.get(path), after.get(path), &mut out);
    }
    out
}

fn diff_value(path: String, before: Option<&Value>, after: Option<&Value>, out: &mut Vec<DiffEntry>) {
    match (before, after) {
        (None, None) => {}
        (None, Some(v)) => out.push(DiffEntry {
            path,
            kind: ChangeKind::Added,
            before: None,
            after: Some(v.clone()),
        }),
        (Some(v), None) => out.push(DiffEntry {
            path,
            kind: ChangeKind::Removed,
            before: Some(v.clone()),
            after: None,
        }),
        (Some(a), Some(b)) if a == b => {}
        (Some(Value::Object(a)), Some(Value::Object(b))) => diff_objects(&path, a, b, out),
        (Some(a), Some(b)) => out.push(DiffEntry {
            path,
            kind: ChangeKind::Modified,
            before: Some(a.clone()),
            after: Some(b.clone()),
        }),
    }
}

fn diff_objects(prefix: &str, a: &Map<String, Value>, b: &Map<String, Value>, out: &mut Vec<DiffEntry>) {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for key in keys {
        diff_value(format!("{prefix}.{key}"), a.get(key), b.get(key), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(entries: &[(&str, Value)]) -> Snapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn identical_snapshots_have_no_diff() {
        let s = snapshot(&[("rooms/101", json!({"area": 42}))]);
        assert!(diff_snapshots(&s, &s).is_empty());
    }

    #[test]
    fn added_and_removed_entities() {
        let a = snapshot(&[("rooms/101", json!({"area": 42}))]);
        let b = snapshot(&[("rooms/102", json!({"area": 30}))]);
        let diff = diff_snapshots(&a, &b);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].path, "rooms/101");
        assert_eq!(diff[0].kind, ChangeKind::Removed);
        assert_eq!(diff[1].path, "rooms/102");
        assert_eq!(diff[1].kind, ChangeKind::Added);
        assert_eq!(diff[1].after, Some(json!({"area": 30})));
    }

    #[test]
    fn modified_fields_recurse() {
        let a = snapshot(&[(
            "equipment/AHU-1",
            json!({"model": "X1", "specs": {"kw": 10, "rpm": 900}, "zones": [1, 2]}),
        )]);
        let b = snapshot(&[(
            "equipment/AHU-1",
            json!({"model": "X1", "specs": {"kw": 12}, "zones": [1, 2, 3], "serial": "S9"}),
        )]);
        let diff = diff_snapshots(&a, &b);
        let got: Vec<(&str, ChangeKind)> = diff.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            got,
            [
                ("equipment/AHU-1.serial", ChangeKind::Added),
                ("equipment/AHU-1.specs.kw", ChangeKind::Modified),
                ("equipment/AHU-1.specs.rpm", ChangeKind::Removed),
                ("equipment/AHU-1.zones", ChangeKind::Modified),
            ]
        );
        assert_eq!(diff[1].before, Some(json!(10)));
        assert_eq!(diff[1].after, Some(json!(12)));
    }

    #[test]
    fn type_change_is_whole_value() {
        let a = snapshot(&[("floors/1", json!({"height": 3}))]);
        let b = snapshot(&[("floors/1", json!("demolished"))]);
        let diff = diff_snapshots(&a, &b);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].path, "floors/1");
        assert_eq!(diff[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn summary_counts() {
        let a = snapshot(&[("a", json!(1)), ("b", json!(2))]);
        let b = snapshot(&[("b", json!(3)), ("c", json!(4))]);
        let summary = DiffSummary::from_entries(&diff_snapshots(&a, &b));
        assert_eq!(
            summary,
            DiffSummary {
                added: 1,
                removed: 1,
                modified: 1
            }
        );
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "1 added, 1 removed, 1 modified");
    }
}
