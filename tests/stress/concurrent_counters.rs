//! Stress test: concurrent progress counter increments from many
//! connections (several browser tabs of one learner) must never lose a
//! count.

use std::sync::{Arc, Barrier};
use std::thread;

use traincert::storage::DB_FILE;
use traincert::time::SystemClock;
use traincert::{catalog, progress, Database};

const THREADS: usize = 8;
const INCREMENTS: i64 = 50;
const NOW: &str = "2026-05-01T10:00:00Z";

#[test]
fn stress_concurrent_counter_increments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE);

    let enrollment = {
        let db = Database::open(&path).unwrap();
        let course = catalog::create_course(&db, &SystemClock, "ladders", "Ladder Safety").unwrap();
        db.with_conn(|c| progress::ensure_enrollment(c, "kim", &course.id, NOW))
            .unwrap()
    };

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let id = enrollment.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path).expect("open db");
                barrier.wait();
                let mut last = 0;
                for _ in 0..INCREMENTS {
                    let value = db
                        .with_conn(|c| progress::increment_counter(c, &id, "quest_steps", 1))
                        .expect("increment");
                    assert!(value > last, "counter went backwards");
                    last = value;
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("thread panicked");
    }

    let db = Database::open(&path).unwrap();
    let total = db
        .with_conn(|c| progress::counter_value(c, &enrollment.id, "quest_steps"))
        .unwrap();
    assert_eq!(total, THREADS as i64 * INCREMENTS);
}

#[test]
fn stress_counter_deltas_sum() {
    let db = Database::open_in_memory().unwrap();
    let course = catalog::create_course(&db, &SystemClock, "ladders", "Ladder Safety").unwrap();
    let enrollment = db
        .with_conn(|c| progress::ensure_enrollment(c, "kim", &course.id, NOW))
        .unwrap();

    let mut expected = 0;
    for delta in [1, 5, -2, 10, 3] {
        expected += delta;
        let value = db
            .with_conn(|c| progress::increment_counter(c, &enrollment.id, "exam_answers_saved", delta))
            .unwrap();
        assert_eq!(value, expected);
    }
}
