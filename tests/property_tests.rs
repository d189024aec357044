//! Property-based tests for core domain types and engine invariants.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;
use serde_json::{json, Value};

use strata::core::snapshot::Snapshot;
use strata::core::types::{Author, BranchName, ContentHash};
use strata::engine::diff::diff_snapshots;
use strata::engine::{BranchOptions, CommitDraft, DiffSummary, Engine};

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..40).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let bad = name.starts_with('.')
                || name.starts_with('-')
                || name.ends_with('/')
                || name.contains("..")
                || name.contains("//")
                || name
                    .split('/')
                    .any(|c| c.starts_with('.') || c.ends_with(".lock"));
            (!bad).then_some(name)
        },
    )
}

/// Leaf values found in building records.
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
    ]
}

/// Entity records: flat objects with a few fields.
fn record() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-d]", leaf(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

fn entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(("(rooms|equipment)/[0-9]{1,2}", record()), 0..8)
}

fn snapshot(entries: &[(String, Value)]) -> Snapshot {
    entries.iter().cloned().collect()
}

proptest! {
    /// Any valid branch name round-trips through serde.
    #[test]
    fn branch_name_serde_roundtrip(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(branch, parsed);
    }

    /// Names containing whitespace are never accepted.
    #[test]
    fn branch_name_rejects_whitespace(prefix in "[a-z]{1,5}", suffix in "[a-z]{1,5}") {
        let name = format!("{prefix} {suffix}");
        prop_assert!(BranchName::new(name).is_err());
    }

    /// The content hash ignores insertion order.
    #[test]
    fn hash_independent_of_insertion_order(items in entries()) {
        let forward = snapshot(&items);
        let mut reversed_items = items.clone();
        reversed_items.reverse();
        // Later duplicates win on insert, so compare only deduplicated input.
        prop_assume!(forward == snapshot(&reversed_items));
        let a = ContentHash::compute(None, &forward.canonical_bytes());
        let b = ContentHash::compute(None, &snapshot(&reversed_items).canonical_bytes());
        prop_assert_eq!(a, b);
    }

    /// A snapshot never differs from itself.
    #[test]
    fn self_diff_is_empty(items in entries()) {
        let s = snapshot(&items);
        prop_assert!(diff_snapshots(&s, &s).is_empty());
    }

    /// Reversing a diff swaps additions and removals.
    #[test]
    fn diff_is_antisymmetric(a in entries(), b in entries()) {
        let (a, b) = (snapshot(&a), snapshot(&b));
        let forward = DiffSummary::from_entries(&diff_snapshots(&a, &b));
        let backward = DiffSummary::from_entries(&diff_snapshots(&b, &a));
        prop_assert_eq!(forward.added, backward.removed);
        prop_assert_eq!(forward.removed, backward.added);
        prop_assert_eq!(forward.modified, backward.modified);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A branch is ahead by the commits made on it, and by zero exactly
    /// when its head is its base.
    #[test]
    fn ahead_counts_commits_since_base(before in 1usize..5, after in 0usize..5) {
        let engine = Engine::in_memory();
        let (repo, _) = engine.init_repository("Prop", "main", false).unwrap();
        let author = Author::new("Ann", "ann@example.com").unwrap();
        let commit = |branch: &str, i: usize| {
            let mut s = Snapshot::new();
            s.insert("meters/M-1", json!({ "branch": branch, "reading": i }));
            engine
                .commit(repo.id, branch, CommitDraft::new(s, format!("{branch} {i}"), author.clone()))
                .unwrap()
        };

        for i in 0..before {
            commit("main", i);
        }
        engine.create_branch(repo.id, "work", None, BranchOptions::default()).unwrap();
        for i in 0..after {
            commit("work", i);
        }

        let status = engine.status(repo.id, "work").unwrap();
        prop_assert_eq!(status.ahead.count, after);
        prop_assert!(status.ahead.base_reached);
        prop_assert_eq!(status.ahead.count == 0, status.branch.head == status.branch.base);
        prop_assert_eq!(status.behind, 0);
    }
}
