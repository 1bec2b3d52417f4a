//! Tests for concurrent Store access
//!
//! These tests verify:
//! - Concurrent saves never hand out the same identifier
//! - Readers run alongside writers and only ever see committed records
//! - State written concurrently survives a reopen

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use atlasdb::{q, Config, ListOptions, Record, Schema, Store, SyncStrategy};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: u64,
    worker: u32,
    seq: u32,
}

impl Record for Event {
    const BUCKET: &'static str = "Event";
}

const WORKERS: u32 = 8;
const PER_WORKER: u32 = 50;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &TempDir) -> Config {
    Config::builder()
        .path(dir.path().join("concurrent.db"))
        .sync_strategy(SyncStrategy::EveryNEntries { count: 64 })
        .schema(Schema::of::<Event>().index("worker"))
        .build()
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_saves_get_distinct_ids() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(config(&temp_dir)).unwrap();

    let ids: Vec<Vec<u64>> = crossbeam::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let store = &store;
                scope.spawn(move |_| {
                    (0..PER_WORKER)
                        .map(|seq| {
                            let mut event = Event { id: 0, worker, seq };
                            let id = store.save(&mut event).unwrap();
                            assert_eq!(event.id, id);
                            id
                        })
                        .collect::<Vec<u64>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    let all: BTreeSet<u64> = ids.iter().flatten().copied().collect();
    let total = (WORKERS * PER_WORKER) as u64;
    assert_eq!(all.len() as u64, total);
    assert_eq!(all.iter().next(), Some(&1));
    assert_eq!(all.iter().next_back(), Some(&total));

    // Each worker sees its own ids in increasing order
    for worker_ids in &ids {
        assert!(worker_ids.windows(2).all(|w| w[0] < w[1]));
    }

    assert_eq!(store.count::<Event>().unwrap(), total as usize);
}

#[test]
fn test_readers_alongside_writer() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(config(&temp_dir)).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for seq in 0..200 {
                let mut event = Event { id: 0, worker: seq % 4, seq };
                store.save(&mut event).unwrap();
            }
        })
    };

    let mut readers = vec![];
    for worker in 0..4 {
        let store = Arc::clone(&store);
        readers.push(thread::spawn(move || {
            let mut last_seen = 0;
            for _ in 0..50 {
                let events: Vec<Event> = store
                    .select::<Event>([q::eq("worker", worker)])
                    .find()
                    .unwrap();
                assert!(events.iter().all(|e| e.worker == worker));

                // Committed records never disappear
                assert!(events.len() >= last_seen);
                last_seen = events.len();
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(store.count::<Event>().unwrap(), 200);
}

#[test]
fn test_concurrent_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let expected: Vec<Event> = {
        let store = Store::open(config(&temp_dir)).unwrap();
        crossbeam::scope(|scope| {
            for worker in 0..WORKERS {
                let store = &store;
                scope.spawn(move |_| {
                    for seq in 0..PER_WORKER {
                        store.save(&mut Event { id: 0, worker, seq }).unwrap();
                    }
                });
            }
        })
        .unwrap();

        let all = store.all(ListOptions::new()).unwrap();
        store.close().unwrap();
        all
    };

    let store = Store::open(config(&temp_dir)).unwrap();
    let reloaded: Vec<Event> = store.all(ListOptions::new()).unwrap();
    assert_eq!(reloaded, expected);
    assert_eq!(
        store.next_id("Event").unwrap(),
        (WORKERS * PER_WORKER) as u64 + 1
    );
}
