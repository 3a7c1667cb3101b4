//! Stress test: many connections publish the same quiz item at once.
//!
//! Every publish must bump the version by exactly one and append exactly
//! one revision; no update may be lost.

use std::sync::{Arc, Barrier};
use std::thread;

use traincert::content::{self, ItemDraft};
use traincert::storage::DB_FILE;
use traincert::{Database, ItemId, TrainError};

const THREADS: usize = 8;
const NOW: &str = "2026-05-01T10:00:00Z";

fn seed_item(path: &std::path::Path) -> ItemId {
    let db = Database::open(path).expect("open db");
    let item = content::create_item(
        &db,
        "author",
        ItemDraft {
            bank_id: "bank".into(),
            locale: "en".into(),
            prompt: "Which lever lowers the forks?".into(),
            choices: vec!["left".into(), "right".into()],
            correct_choice: 0,
        },
        NOW,
    )
    .expect("create item");
    assert_eq!(item.version, 1);
    item.id
}

#[test]
fn stress_concurrent_publish_no_lost_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE);
    let id = seed_item(&path);

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let path = path.clone();
            let id = id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path).expect("open db");
                barrier.wait();
                content::publish_item(&db, &id, &format!("staff-{t}"), None, NOW)
                    .expect("publish should succeed")
                    .version
            })
        })
        .collect();

    let mut versions: Vec<u32> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();
    versions.sort_unstable();
    let expected: Vec<u32> = (2..=(THREADS as u32 + 1)).collect();
    assert_eq!(versions, expected, "each publish must see a distinct version");

    let db = Database::open(&path).unwrap();
    let item = db.with_conn(|c| content::get_item(c, &id)).unwrap();
    assert_eq!(item.version, THREADS as u32 + 1);

    let history = db.with_conn(|c| content::item_history(c, &id)).unwrap();
    assert_eq!(history.len(), THREADS + 1);
    for (i, rev) in history.iter().enumerate() {
        assert_eq!(rev.version, i as u32 + 1, "revision {i} out of sequence");
    }
}

#[test]
fn stress_concurrent_publish_with_expected_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE);
    let id = seed_item(&path);

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let path = path.clone();
            let id = id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path).expect("open db");
                barrier.wait();
                content::publish_item(&db, &id, &format!("staff-{t}"), Some(1), NOW)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one compare-and-set may win");
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, TrainError::Conflict(_)), "unexpected error: {e}");
        }
    }

    let db = Database::open(&path).unwrap();
    let history = db.with_conn(|c| content::item_history(c, &id)).unwrap();
    assert_eq!(history.len(), 2);
}
