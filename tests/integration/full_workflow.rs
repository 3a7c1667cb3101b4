//! Integration test: full end-to-end learner workflow.
//!
//! Tests the complete lifecycle:
//! 1. Staff build a 5-module course and a published exam bank
//! 2. A learner completes every gate step of modules 1-3
//! 3. The learner fails the exam, then passes on retry with 85%
//! 4. An evaluator records a passed practical
//! 5. The learner is eligible and a certificate is issued and verified

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use traincert::{
    Actor, Database, Engine, EngineConfig, EvaluationInput, GateStep, IssueRequest, IssuerKey,
    ItemDraft, ItemId, ManualClock, NewModule, Role, StartExam, TrainError,
};

const COURSE: &str = "forklift";
const BANK: &str = "forklift-final";

fn build_engine() -> Engine {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap(),
    ));
    Engine::new(
        Database::open_in_memory().expect("in-memory db"),
        EngineConfig::default(),
        IssuerKey::generate(),
    )
    .with_clock(clock)
}

/// Create the course and a 20-item bank; return the answer key.
fn seed(engine: &Engine) -> HashMap<ItemId, u32> {
    let staff = Actor::staff("staff-1");
    engine
        .create_course(&staff, COURSE, "Forklift Operator Safety")
        .unwrap();
    for order in 1..=5u32 {
        let mut module = NewModule::new(order, format!("Module {order}"), format!("s3://c/{order}"))
            .with_key(format!("m{order}"));
        // Modules 4 and 5 are theory-only.
        if order > 3 {
            module = module.without_demo();
        }
        engine.add_module(&staff, COURSE, module).unwrap();
    }

    let mut key = HashMap::new();
    for i in 0..20u32 {
        let item = engine
            .create_item(
                &staff,
                ItemDraft {
                    bank_id: BANK.into(),
                    locale: "en".into(),
                    prompt: format!("Question {i}"),
                    choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_choice: i % 4,
                },
            )
            .unwrap();
        let published = engine.publish_item(&staff, &item.id, Some(item.version)).unwrap();
        assert_eq!(published.version, item.version + 1);
        key.insert(item.id, i % 4);
    }
    key
}

/// Answer `correct` items right and the rest wrong.
fn answers_for(
    items: &[traincert::LearnerItem],
    key: &HashMap<ItemId, u32>,
    correct: usize,
) -> BTreeMap<ItemId, u32> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let right = key[&item.id];
            let choice = if i < correct { right } else { (right + 1) % 4 };
            (item.id.clone(), choice)
        })
        .collect()
}

#[test]
fn full_workflow_enrollment_to_certificate() {
    let engine = build_engine();
    let key = seed(&engine);
    let learner = Actor::learner("learner-7");

    // ── Step 1: Nothing done yet ────────────────────────────────────────
    engine.enroll(&learner, COURSE).unwrap();
    let verdict = engine
        .check_eligibility(&learner, "learner-7", COURSE)
        .unwrap();
    assert!(!verdict.eligible);
    assert_eq!(verdict.reasons, vec!["demos", "quiz", "practical"]);
    assert!(!engine
        .is_module_unlocked(&learner, "learner-7", COURSE, 2)
        .unwrap());

    // ── Step 2: Complete modules 1-3 ────────────────────────────────────
    let mut last_pct = 0;
    for order in 1..=3 {
        let module = format!("m{order}");
        for step in GateStep::ALL {
            let outcome = engine
                .mark_step(&learner, COURSE, &module, step.as_str())
                .unwrap();
            assert!(outcome.progress_pct >= last_pct, "progress went backwards");
            last_pct = outcome.progress_pct;
        }
        assert!(engine
            .is_module_unlocked(&learner, "learner-7", COURSE, order + 1)
            .unwrap());
    }
    assert_eq!(last_pct, 60);
    let resume = engine.resume_order(&learner, "learner-7", COURSE).unwrap();
    assert_eq!(resume.order, 4);

    // Re-marking a finished step changes nothing.
    let again = engine
        .mark_step(&learner, COURSE, "m1", "content_read")
        .unwrap();
    assert!(!again.changed);
    assert_eq!(again.progress_pct, 60);

    // ── Step 3: Fail the exam, then pass with 85% ───────────────────────
    let req = StartExam {
        bank_id: BANK.into(),
        count: 20,
        locale: "en".into(),
    };
    let first = engine.start_exam(&learner, COURSE, &req).unwrap();
    assert_eq!(first.delivered, 20);
    let first_id = first.exam_id.clone().expect("exam session");
    let result = engine
        .submit_exam(&learner, &first_id, answers_for(&first.items, &key, 10))
        .unwrap();
    assert!(!result.passed);
    assert_eq!(result.score_pct, 50);

    let verdict = engine
        .check_eligibility(&learner, "learner-7", COURSE)
        .unwrap();
    assert_eq!(verdict.reasons, vec!["quiz", "practical"]);

    let retry = engine.start_exam(&learner, COURSE, &req).unwrap();
    let retry_id = retry.exam_id.clone().expect("exam session");
    assert_ne!(retry_id, first_id);

    // Autosave half the answers, resume, then submit everything.
    let answers = answers_for(&retry.items, &key, 17);
    let partial: BTreeMap<ItemId, u32> = answers.clone().into_iter().take(10).collect();
    let saved = engine.save_exam(&learner, &retry_id, partial, None).unwrap();
    assert_eq!(saved.answered, 10);
    let resumed = engine.resume_exam(&learner).unwrap().expect("in progress");
    assert_eq!(resumed.exam_id, retry_id);
    assert_eq!(resumed.answers.len(), 10);

    let result = engine.submit_exam(&learner, &retry_id, answers).unwrap();
    assert!(result.passed);
    assert_eq!((result.score, result.total, result.score_pct), (17, 20, 85));
    assert_eq!(result.pass_pct, 80);
    assert!(engine.resume_exam(&learner).unwrap().is_none());

    // ── Step 4: Practical evaluation ────────────────────────────────────
    let verdict = engine
        .check_eligibility(&learner, "learner-7", COURSE)
        .unwrap();
    assert_eq!(verdict.reasons, vec!["practical"]);

    let evaluator = Actor::new("eval-3", Role::Evaluator);
    engine
        .record_evaluation(
            &evaluator,
            "learner-7",
            COURSE,
            &EvaluationInput {
                evaluator_name: "Pat Evaluator".into(),
                evaluated_on: "2026-06-15".into(),
                practical_pass: true,
                evaluator_signature: Some("s3://sig/eval-3.png".into()),
                trainee_signature: None,
                notes: None,
            },
        )
        .unwrap();

    let verdict = engine
        .check_eligibility(&learner, "learner-7", COURSE)
        .unwrap();
    assert!(verdict.eligible);
    assert!(verdict.reasons.is_empty());

    // ── Step 5: Issue and verify ────────────────────────────────────────
    let req = IssueRequest {
        learner_id: "learner-7".into(),
        course_slug: COURSE.into(),
        score: None,
    };
    assert!(matches!(
        engine.issue_certificate(&learner, &req),
        Err(TrainError::Forbidden(_))
    ));

    let issued = engine.issue_certificate(&Actor::system(), &req).unwrap();
    assert_eq!(issued.payload.score, 85);
    assert!(issued.payload.practical_verified);
    assert!(issued.verification_url.ends_with(&issued.verification_code));
    assert_eq!(issued.expires_at, "2029-06-15T09:00:00Z");

    let v = engine.verify_certificate(&issued.verification_code).unwrap();
    assert!(v.valid);
    assert!(!v.expired);
    assert!(!v.revoked);
    assert!(v.practical_verified);
    assert!(v.reasons.is_empty());
    assert_eq!(v.certificate_id, issued.id);

    match engine.issue_certificate(&Actor::system(), &req) {
        Err(TrainError::AlreadyIssued(code)) => assert_eq!(code, issued.verification_code),
        other => panic!("expected AlreadyIssued, got {other:?}"),
    }
}

#[test]
fn full_workflow_other_learner_cannot_touch_exam() {
    let engine = build_engine();
    let key = seed(&engine);
    let owner = Actor::learner("owner");
    let intruder = Actor::learner("intruder");

    let started = engine
        .start_exam(
            &owner,
            COURSE,
            &StartExam {
                bank_id: BANK.into(),
                count: 5,
                locale: "en".into(),
            },
        )
        .unwrap();
    let exam_id = started.exam_id.expect("exam session");
    let answers = answers_for(&started.items, &key, 5);

    assert!(matches!(
        engine.submit_exam(&intruder, &exam_id, answers.clone()),
        Err(TrainError::Forbidden(_))
    ));
    assert!(engine.resume_exam(&intruder).unwrap().is_none());

    let result = engine.submit_exam(&owner, &exam_id, answers).unwrap();
    assert!(result.passed);
    assert_eq!(result.score_pct, 100);
}
