//! Progress data structures.

use serde::{Deserialize, Serialize};

use crate::ids::{CourseId, EnrollmentId};

/// Stored resume pointer. Older enrollments have none, and some stored
/// pointers are zero or negative; readers must not trust `order` blindly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub tab: Option<String>,
    #[serde(default)]
    pub at: Option<String>,
}

/// A learner's enrollment in one course. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub learner_id: String,
    pub course_id: CourseId,
    pub progress_pct: u8,
    pub resume_state: Option<ResumeState>,
    pub passed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Which resume strategy produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTier {
    StoredPointer,
    FirstUnpassedQuiz,
    DefaultFirst,
}

/// Result of resume resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeDecision {
    pub order: u32,
    pub tier: ResumeTier,
}
