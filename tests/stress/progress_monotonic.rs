//! Stress test: progress never goes backwards and the resume pointer stays
//! inside the course, over long random sequences of gate calls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use traincert::{Actor, Database, Engine, EngineConfig, GateStep, IssuerKey, NewModule};

const MODULES: u32 = 5;
const COURSE: &str = "confined-space";

fn engine() -> Engine {
    let engine = Engine::new(
        Database::open_in_memory().unwrap(),
        EngineConfig::default(),
        IssuerKey::generate(),
    );
    let staff = Actor::staff("ops");
    engine.create_course(&staff, COURSE, "Confined Space Entry").unwrap();
    for order in 1..=MODULES {
        engine
            .add_module(&staff, COURSE, NewModule::new(order, format!("M{order}"), "c"))
            .unwrap();
    }
    engine
}

#[test]
fn stress_progress_monotonic_random_sequences() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let engine = engine();
        let learner_id = format!("learner-{seed}");
        let learner = Actor::learner(learner_id.clone());

        let mut last_pct = 0u8;
        for _ in 0..60 {
            let order = rng.gen_range(1..=MODULES);
            let step = GateStep::ALL[rng.gen_range(0..4)];
            let outcome = engine
                .mark_step(&learner, COURSE, &order.to_string(), step.as_str())
                .unwrap();

            assert!(
                outcome.progress_pct >= last_pct,
                "seed {seed}: progress fell from {last_pct} to {}",
                outcome.progress_pct
            );
            assert!(outcome.progress_pct <= 100);
            assert!((1..=MODULES).contains(&outcome.resume_order));
            last_pct = outcome.progress_pct;

            let resume = engine.resume_order(&learner, &learner_id, COURSE).unwrap();
            assert!((1..=MODULES).contains(&resume.order));
        }

        // Unlock rule: module k > 1 is unlocked iff module k - 1 is complete.
        let states = engine.gate_states(&learner, &learner_id, COURSE).unwrap();
        for order in 2..=MODULES {
            let prev_complete = states
                .iter()
                .any(|s| s.order == order - 1 && s.is_complete());
            let unlocked = engine
                .is_module_unlocked(&learner, &learner_id, COURSE, order)
                .unwrap();
            assert_eq!(unlocked, prev_complete, "seed {seed}: module {order}");
        }
        assert!(engine
            .is_module_unlocked(&learner, &learner_id, COURSE, 1)
            .unwrap());
    }
}

#[test]
fn stress_all_steps_reach_full_progress() {
    let engine = engine();
    let learner = Actor::learner("finisher");

    // Walk modules backwards so partial credit is exercised out of order.
    let mut last_pct = 0;
    for order in (1..=MODULES).rev() {
        for step in GateStep::ALL {
            let outcome = engine
                .mark_step(&learner, COURSE, &order.to_string(), step.as_str())
                .unwrap();
            assert!(outcome.progress_pct >= last_pct);
            last_pct = outcome.progress_pct;
        }
    }
    assert_eq!(last_pct, 100);
    let resume = engine.resume_order(&learner, "finisher", COURSE).unwrap();
    assert_eq!(resume.order, MODULES);
}
