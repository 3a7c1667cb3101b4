//! Per-learner course progress: enrollments, percentage, resume pointer and
//! atomic step counters.
//!
//! `progress_pct` only ever moves up; the store applies `MAX(old, new)` so two
//! racing writers cannot lower it.

pub mod engine;
pub mod resume;
pub mod types;

pub use types::{Enrollment, ResumeDecision, ResumeState, ResumeTier};

pub use engine::{
    counter_value, enrollment_by_id, ensure_enrollment, find_enrollment, increment_counter,
    passed_quiz_orders, progress_pct, raise_progress, resolve_resume_order, set_resume_state,
    COUNTER_EXAM_ANSWERS_SAVED, COUNTER_STEPS_COMPLETED,
};
pub use resume::{resolve_with, ResumeContext, ResumeStrategy, DEFAULT_STRATEGIES};
