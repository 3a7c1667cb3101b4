//! The three store-backed eligibility signals.

use crate::catalog;
use crate::error::Result;
use crate::evaluation;
use crate::gate;
use crate::progress::{self, Enrollment};
use crate::storage::Database;

/// One independent completion signal.
pub trait EligibilitySignal: Send + Sync {
    /// Reason reported when the signal is not satisfied.
    fn reason(&self) -> &'static str;

    fn satisfied(&self, db: &Database, enrollment: &Enrollment) -> Result<bool>;
}

/// Every demo-bearing module of the course has a complete gate.
///
/// A course with no demo-bearing module requires every module instead.
pub struct DemoCompletion;

impl EligibilitySignal for DemoCompletion {
    fn reason(&self) -> &'static str {
        "demos"
    }

    fn satisfied(&self, db: &Database, enrollment: &Enrollment) -> Result<bool> {
        db.read_retrying(|c| {
            let modules = catalog::course_modules(c, &enrollment.course_id)?;
            if modules.is_empty() {
                return Ok(false);
            }
            let demos: Vec<_> = modules.iter().filter(|m| m.demo).collect();
            let required = if demos.is_empty() {
                modules.iter().collect()
            } else {
                demos
            };
            let states = gate::gate_states(c, &enrollment.id)?;
            Ok(required.iter().all(|m| {
                states
                    .iter()
                    .any(|g| g.module_id == m.id && g.is_complete())
            }))
        })
    }
}

/// The learner has passed the final exam.
pub struct ExamPass;

impl EligibilitySignal for ExamPass {
    fn reason(&self) -> &'static str {
        "quiz"
    }

    fn satisfied(&self, db: &Database, enrollment: &Enrollment) -> Result<bool> {
        db.read_retrying(|c| Ok(progress::enrollment_by_id(c, &enrollment.id)?.passed))
    }
}

/// A practical evaluation marked as passed is on record.
pub struct PracticalPass;

impl EligibilitySignal for PracticalPass {
    fn reason(&self) -> &'static str {
        "practical"
    }

    fn satisfied(&self, db: &Database, enrollment: &Enrollment) -> Result<bool> {
        db.read_retrying(|c| {
            Ok(evaluation::practical_evaluation(c, &enrollment.id)?
                .map(|e| e.practical_pass)
                .unwrap_or(false))
        })
    }
}

/// Production signals, in reporting order.
pub static DEFAULT_SIGNALS: [&dyn EligibilitySignal; 3] = [&DemoCompletion, &ExamPass, &PracticalPass];
