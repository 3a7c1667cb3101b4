//! Integration test: certificate lifecycle.
//!
//! Issue, verify, tamper, expire, recertify, re-issue and revoke, with a
//! manual clock driving time forward.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use traincert::credential::{certificate_by_code, verify_offline};
use traincert::{
    Actor, Database, Engine, EngineConfig, EvaluationInput, GateStep, IssueRequest, IssuerKey,
    ItemDraft, ManualClock, NewModule, Role, StartExam, TrainError,
};

const COURSE: &str = "aerial-lift";
const LEARNER: &str = "dana";

fn engine() -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 10, 14, 30, 0).unwrap(),
    ));
    let engine = Engine::new(
        Database::open_in_memory().unwrap(),
        EngineConfig::default(),
        IssuerKey::generate(),
    )
    .with_clock(clock.clone());
    (engine, clock)
}

/// Bring LEARNER to eligibility in a one-module course.
fn make_eligible(engine: &Engine) {
    let staff = Actor::staff("ops");
    let learner = Actor::learner(LEARNER);
    engine.create_course(&staff, COURSE, "Aerial Lift").unwrap();
    engine
        .add_module(&staff, COURSE, NewModule::new(1, "Basics", "s3://c/1"))
        .unwrap();

    let mut key = BTreeMap::new();
    for i in 0..5u32 {
        let item = engine
            .create_item(
                &staff,
                ItemDraft {
                    bank_id: "lift".into(),
                    locale: "en".into(),
                    prompt: format!("Q{i}"),
                    choices: vec!["yes".into(), "no".into()],
                    correct_choice: i % 2,
                },
            )
            .unwrap();
        engine.publish_item(&staff, &item.id, None).unwrap();
        key.insert(item.id, i % 2);
    }

    for step in GateStep::ALL {
        engine.mark_step(&learner, COURSE, "1", step.as_str()).unwrap();
    }

    let started = engine
        .start_exam(
            &learner,
            COURSE,
            &StartExam {
                bank_id: "lift".into(),
                count: 5,
                locale: "en".into(),
            },
        )
        .unwrap();
    let exam_id = started.exam_id.unwrap();
    let result = engine.submit_exam(&learner, &exam_id, key).unwrap();
    assert!(result.passed);

    engine
        .record_evaluation(
            &Actor::new("trainer-1", Role::Trainer),
            LEARNER,
            COURSE,
            &EvaluationInput {
                evaluator_name: "Lee Trainer".into(),
                evaluated_on: "2026-01-09".into(),
                practical_pass: true,
                evaluator_signature: None,
                trainee_signature: None,
                notes: Some("smooth controls".into()),
            },
        )
        .unwrap();
}

fn issue_request() -> IssueRequest {
    IssueRequest {
        learner_id: LEARNER.into(),
        course_slug: COURSE.into(),
        score: None,
    }
}

#[test]
fn certificate_expiry_and_recertification() {
    let (engine, clock) = engine();
    make_eligible(&engine);
    let learner = Actor::learner(LEARNER);

    let recert = engine.recert_status(&learner, LEARNER).unwrap();
    assert!(!recert.has_certificate);
    assert!(!recert.due);

    let first = engine
        .issue_certificate(&Actor::system(), &issue_request())
        .unwrap();
    assert_eq!(first.payload.score, 100);
    assert!(first.supersedes.is_none());

    let recert = engine.recert_status(&learner, LEARNER).unwrap();
    assert!(recert.has_certificate);
    assert!(!recert.due);
    assert_eq!(recert.current_until.as_deref(), Some("2029-01-10T14:30:00Z"));

    // One second before the three-year mark: still current.
    clock.set(Utc.with_ymd_and_hms(2029, 1, 10, 14, 29, 59).unwrap());
    assert!(!engine.recert_status(&learner, LEARNER).unwrap().due);
    assert!(matches!(
        engine.issue_certificate(&Actor::system(), &issue_request()),
        Err(TrainError::AlreadyIssued(_))
    ));

    // Exactly at the mark: due, but not yet expired.
    clock.advance(Duration::seconds(1));
    assert!(engine.recert_status(&learner, LEARNER).unwrap().due);
    let v = engine.verify_certificate(&first.verification_code).unwrap();
    assert!(v.valid);
    assert!(!v.expired);

    // Past expiry: verification still says valid, and says expired.
    clock.advance(Duration::seconds(1));
    let v = engine.verify_certificate(&first.verification_code).unwrap();
    assert!(v.valid);
    assert!(v.expired);
    assert_eq!(v.reasons, vec!["expired"]);

    let second = engine
        .issue_certificate(&Actor::system(), &issue_request())
        .unwrap();
    assert_eq!(second.supersedes.as_ref(), Some(&first.id));
    assert_ne!(second.verification_code, first.verification_code);

    let recert = engine.recert_status(&learner, LEARNER).unwrap();
    assert_eq!(recert.certificate_id.as_ref(), Some(&second.id));
    assert!(!recert.due);
}

#[test]
fn tampered_payload_fails_verification() {
    let (engine, _) = engine();
    make_eligible(&engine);
    let issued = engine
        .issue_certificate(&Actor::system(), &issue_request())
        .unwrap();
    let code = issued.verification_code.clone();

    let changed = engine
        .db()
        .with_conn(|c| {
            Ok(c.execute(
                "UPDATE certificates
                 SET signed_payload = replace(signed_payload, '\"score\":100', '\"score\":99')
                 WHERE verification_code = ?1",
                [code.as_str()],
            )?)
        })
        .unwrap();
    assert_eq!(changed, 1);

    let v = engine.verify_certificate(&code).unwrap();
    assert!(!v.valid);
    assert!(!v.expired);
    assert_eq!(v.reasons, vec!["signature"]);
    assert_eq!(v.details.map(|d| d.score), Some(99));
}

#[test]
fn offline_verification_with_public_key() {
    let (engine, _) = engine();
    make_eligible(&engine);
    let issued = engine
        .issue_certificate(&Actor::staff("ops"), &issue_request())
        .unwrap();

    let cert = engine
        .db()
        .with_conn(|c| certificate_by_code(c, &issued.verification_code))
        .unwrap();
    let public_key = engine.issuer().public_key_base64();
    let now = engine.now();

    let ok = verify_offline(&cert.signed_payload, &cert.signature, &public_key, now).unwrap();
    assert!(ok.valid);
    assert!(!ok.expired);

    let other_key = IssuerKey::generate().public_key_base64();
    let bad = verify_offline(&cert.signed_payload, &cert.signature, &other_key, now).unwrap();
    assert!(!bad.valid);

    let later = now + Duration::days(365 * 4);
    let old = verify_offline(&cert.signed_payload, &cert.signature, &public_key, later).unwrap();
    assert!(old.valid);
    assert!(old.expired);
}

#[test]
fn revocation_is_staff_only_and_reported() {
    let (engine, _) = engine();
    make_eligible(&engine);
    let issued = engine
        .issue_certificate(&Actor::system(), &issue_request())
        .unwrap();
    let code = &issued.verification_code;

    assert!(matches!(
        engine.revoke_certificate(&Actor::learner(LEARNER), code, "fraud"),
        Err(TrainError::Forbidden(_))
    ));
    assert!(matches!(
        engine.revoke_certificate(&Actor::staff("ops"), code, "  "),
        Err(TrainError::InvalidInput(_))
    ));

    let revoked = engine
        .revoke_certificate(&Actor::staff("ops"), code, "issued in error")
        .unwrap();
    assert!(revoked.revoked);
    assert_eq!(revoked.revoked_reason.as_deref(), Some("issued in error"));

    let v = engine.verify_certificate(code).unwrap();
    assert!(v.valid);
    assert!(v.revoked);
    assert_eq!(v.reasons, vec!["revoked"]);

    assert!(matches!(
        engine.revoke_certificate(&Actor::staff("ops"), code, "again"),
        Err(TrainError::Conflict(_))
    ));

    // A revoked certificate no longer blocks issuance or counts for recert.
    let learner = Actor::learner(LEARNER);
    assert!(!engine.recert_status(&learner, LEARNER).unwrap().has_certificate);
    let next = engine
        .issue_certificate(&Actor::system(), &issue_request())
        .unwrap();
    assert_ne!(next.verification_code, issued.verification_code);
}

#[test]
fn unknown_code_is_not_found() {
    let (engine, _) = engine();
    assert!(matches!(
        engine.verify_certificate("ZZZZZZZZZZZZZZZZ"),
        Err(TrainError::NotFound(_))
    ));
}
