//! Racing writers against the head compare-and-set.

use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;
use tempfile::TempDir;

use strata::core::snapshot::Snapshot;
use strata::core::types::Author;
use strata::engine::{CommitDraft, Engine, EngineConfig, ErrorKind};
use strata::store::FileStore;

const WRITERS: usize = 8;

fn author(i: usize) -> Author {
    Author::new(format!("Writer {i}"), format!("w{i}@example.com")).unwrap()
}

fn snapshot(i: usize) -> Snapshot {
    let mut s = Snapshot::new();
    s.insert("meters/M-1", json!({ "reading": i }));
    s
}

/// Every writer builds on the same head; exactly one head update wins.
fn race_on_head(engine: Engine) {
    let (repo, main) = engine.init_repository("Race", "main", false).unwrap();
    let root = engine
        .commit(repo.id, "main", CommitDraft::new(snapshot(0), "root", author(0)))
        .unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (1..=WRITERS)
        .map(|i| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let commit = engine
                    .commits()
                    .create_commit(
                        repo.id,
                        main.id,
                        Some(root.id),
                        CommitDraft::new(snapshot(i), format!("writer {i}"), author(i)),
                    )
                    .unwrap();
                barrier.wait();
                engine
                    .branches()
                    .update_head(main.id, Some(root.id), commit.id)
                    .map(|_| commit.id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "{results:?}");
    for loser in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(loser.kind(), ErrorKind::Conflict);
    }

    let head = engine.get_branch(repo.id, "main").unwrap().head;
    assert_eq!(head, Some(*winners[0]));
}

#[test]
fn one_winner_in_memory() {
    race_on_head(Engine::in_memory());
}

#[test]
fn one_winner_on_file_store() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("store.json"));
    race_on_head(Engine::new(Arc::new(store), EngineConfig::default()));
}

#[test]
fn retrying_writers_all_land() {
    let engine = Engine::in_memory();
    let (repo, _) = engine.init_repository("Queue", "main", false).unwrap();

    let handles: Vec<_> = (1..=WRITERS)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || loop {
                let draft = CommitDraft::new(snapshot(i), format!("writer {i}"), author(i));
                match engine.commit(repo.id, "main", draft) {
                    Ok(commit) => return commit,
                    Err(e) if e.kind() == ErrorKind::Conflict => continue,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = engine.log(repo.id, Some("main"), 100, 0).unwrap();
    assert_eq!(history.len(), WRITERS);
    assert!(engine.verify(repo.id).unwrap().is_ok());
}
