//! Eligibility: all three completion signals must hold.
//!
//! Each signal is read independently. A signal whose source fails counts as
//! not satisfied, and its reason is reported like any other.

pub mod signals;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::Result;
use crate::ids::EnrollmentId;
use crate::progress;
use crate::storage::Database;

pub use signals::{DemoCompletion, EligibilitySignal, ExamPass, PracticalPass, DEFAULT_SIGNALS};

/// Verdict plus what is still missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    /// Reason names of unmet signals: `demos`, `quiz`, `practical`.
    pub reasons: Vec<String>,
    pub enrollment_id: Option<EnrollmentId>,
}

/// Evaluate `signals` for a learner in a course.
///
/// A learner with no enrollment fails every signal.
pub fn check_eligibility(
    db: &Database,
    signals: &[&dyn EligibilitySignal],
    learner_id: &str,
    course_slug: &str,
) -> Result<Eligibility> {
    let enrollment = db.read_retrying(|c| {
        let course = catalog::course_by_slug(c, course_slug)?;
        progress::find_enrollment(c, learner_id, &course.id)
    })?;

    let Some(enrollment) = enrollment else {
        return Ok(Eligibility {
            eligible: false,
            reasons: signals.iter().map(|s| s.reason().to_string()).collect(),
            enrollment_id: None,
        });
    };

    let reasons: Vec<String> = signals
        .iter()
        .filter(|signal| match signal.satisfied(db, &enrollment) {
            Ok(ok) => !ok,
            Err(e) => {
                log::warn!(
                    "eligibility signal '{}' unavailable for {}: {e}",
                    signal.reason(),
                    enrollment.id
                );
                true
            }
        })
        .map(|signal| signal.reason().to_string())
        .collect();

    log::debug!(
        "eligibility {learner_id}/{course_slug}: missing {:?}",
        reasons
    );
    Ok(Eligibility {
        eligible: reasons.is_empty(),
        reasons,
        enrollment_id: Some(enrollment.id),
    })
}
