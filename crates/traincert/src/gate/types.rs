//! Gate data structures.

use serde::{Deserialize, Serialize};

use crate::error::TrainError;
use crate::ids::{EnrollmentId, ModuleId};

/// One of the four sub-steps of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStep {
    ContentRead,
    PracticeDone,
    CardsDone,
    QuizPassed,
}

impl GateStep {
    pub const ALL: [GateStep; 4] = [
        GateStep::ContentRead,
        GateStep::PracticeDone,
        GateStep::CardsDone,
        GateStep::QuizPassed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GateStep::ContentRead => "content_read",
            GateStep::PracticeDone => "practice_done",
            GateStep::CardsDone => "cards_done",
            GateStep::QuizPassed => "quiz_passed",
        }
    }

    /// Column in `gate_states`. Same as [`as_str`](Self::as_str).
    pub(crate) fn column(&self) -> &'static str {
        self.as_str()
    }

    /// Tab the learner was on when completing this step.
    pub fn tab(&self) -> &'static str {
        match self {
            GateStep::ContentRead => "content",
            GateStep::PracticeDone => "practice",
            GateStep::CardsDone => "cards",
            GateStep::QuizPassed => "quiz",
        }
    }
}

impl std::fmt::Display for GateStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateStep {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GateStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| TrainError::InvalidStep(s.to_string()))
    }
}

/// Gate record for one (enrollment, module).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateState {
    pub enrollment_id: EnrollmentId,
    pub module_id: ModuleId,
    pub order: u32,
    pub content_read: bool,
    pub practice_done: bool,
    pub cards_done: bool,
    pub quiz_passed: bool,
    pub updated_at: String,
}

impl GateState {
    pub fn is_set(&self, step: GateStep) -> bool {
        match step {
            GateStep::ContentRead => self.content_read,
            GateStep::PracticeDone => self.practice_done,
            GateStep::CardsDone => self.cards_done,
            GateStep::QuizPassed => self.quiz_passed,
        }
    }

    pub fn steps_done(&self) -> u8 {
        GateStep::ALL.iter().filter(|s| self.is_set(**s)).count() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.steps_done() == 4
    }
}

/// Result of marking a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkOutcome {
    pub state: GateState,
    /// False when the step was already set.
    pub changed: bool,
    pub progress_pct: u8,
    /// Resume pointer after the update.
    pub resume_order: u32,
}

/// A recorded module quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub enrollment_id: EnrollmentId,
    pub module_id: ModuleId,
    pub score_pct: u32,
    pub passed: bool,
    pub attempted_at: String,
}
