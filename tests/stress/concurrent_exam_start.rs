//! Stress test: one learner starts the same exam from many connections.
//!
//! At most one session may be in progress per learner; every other start
//! must fail with `Conflict`.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};

use traincert::content::{self, ItemDraft};
use traincert::storage::DB_FILE;
use traincert::time::SystemClock;
use traincert::{catalog, exam, progress, Database, StartExam, TrainError};

const THREADS: usize = 8;
const NOW: &str = "2026-05-01T10:00:00Z";

#[test]
fn stress_concurrent_exam_start_single_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE);

    let enrollment = {
        let db = Database::open(&path).unwrap();
        let course = catalog::create_course(&db, &SystemClock, "scaffold", "Scaffolding").unwrap();
        for i in 0..10 {
            let item = content::create_item(
                &db,
                "author",
                ItemDraft {
                    bank_id: "final".into(),
                    locale: "en".into(),
                    prompt: format!("Q{i}"),
                    choices: vec!["a".into(), "b".into(), "c".into()],
                    correct_choice: 2,
                },
                NOW,
            )
            .unwrap();
            content::publish_item(&db, &item.id, "author", None, NOW).unwrap();
        }
        db.with_conn(|c| progress::ensure_enrollment(c, "sam", &course.id, NOW))
            .unwrap()
    };

    let now = Utc.with_ymd_and_hms(2026, 5, 1, 10, 5, 0).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let enrollment = enrollment.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path).expect("open db");
                let req = StartExam {
                    bank_id: "final".into(),
                    count: 5,
                    locale: "en".into(),
                };
                barrier.wait();
                exam::start_exam(&db, &enrollment, &req, 3600, now, &mut rand::thread_rng())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    let started: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(started.len(), 1, "exactly one start may win");
    assert_eq!(started[0].delivered, 5);
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, TrainError::Conflict(_)), "unexpected error: {e}");
        }
    }

    let db = Database::open(&path).unwrap();
    let live: i64 = db
        .with_conn(|c| {
            Ok(c.query_row(
                "SELECT COUNT(*) FROM exam_sessions WHERE learner_id = 'sam' AND status = 'in_progress'",
                [],
                |r| r.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(live, 1);
}
