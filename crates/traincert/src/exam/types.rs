//! Exam data structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::QuizItem;
use crate::error::{Result, TrainError};
use crate::ids::{CourseId, EnrollmentId, ExamId, ItemId, PaperId};
use crate::time::parse_rfc3339;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    InProgress,
    Submitted,
    Expired,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::InProgress => "in_progress",
            ExamStatus::Submitted => "submitted",
            ExamStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "in_progress" => Ok(ExamStatus::InProgress),
            "submitted" => Ok(ExamStatus::Submitted),
            "expired" => Ok(ExamStatus::Expired),
            other => Err(TrainError::DataIntegrity(format!(
                "unknown exam status '{other}'"
            ))),
        }
    }
}

/// Parameters for starting an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExam {
    pub bank_id: String,
    pub count: u32,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

/// A question as shown to a learner. Carries no answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerItem {
    pub id: ItemId,
    pub prompt: String,
    pub choices: Vec<String>,
}

impl From<&QuizItem> for LearnerItem {
    fn from(item: &QuizItem) -> Self {
        Self {
            id: item.id.clone(),
            prompt: item.prompt.clone(),
            choices: item.choices.clone(),
        }
    }
}

/// The fixed item selection for one exam instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamPaper {
    pub id: PaperId,
    pub bank_id: String,
    pub course_id: CourseId,
    pub locale: String,
    /// Presentation order.
    pub item_ids: Vec<ItemId>,
    pub requested: u32,
    pub created_at: String,
}

/// One learner's sitting of a paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: ExamId,
    pub paper_id: PaperId,
    pub learner_id: String,
    pub enrollment_id: EnrollmentId,
    pub status: ExamStatus,
    pub answers: BTreeMap<ItemId, u32>,
    /// Budget left as of `updated_at`.
    pub remaining_sec: i64,
    pub started_at: String,
    pub updated_at: String,
    pub submitted_at: Option<String>,
    pub score: Option<u32>,
    pub total: Option<u32>,
    pub passed: Option<bool>,
}

impl ExamSession {
    /// Seconds left at `now`; the budget keeps running between saves.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Result<i64> {
        let since = (now - parse_rfc3339(&self.updated_at)?).num_seconds().max(0);
        Ok((self.remaining_sec - since).max(0))
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.status == ExamStatus::InProgress && self.remaining_at(now)? == 0)
    }
}

/// Response to a start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedExam {
    /// `None` when the bank had nothing to offer; no session is created then.
    pub exam_id: Option<ExamId>,
    pub locale: String,
    pub items: Vec<LearnerItem>,
    pub requested: u32,
    pub delivered: u32,
    pub remaining_sec: i64,
}

/// An in-progress session, rehydrated for the learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumedExam {
    pub exam_id: ExamId,
    pub locale: String,
    pub items: Vec<LearnerItem>,
    pub answers: BTreeMap<ItemId, u32>,
    pub remaining_sec: i64,
    pub started_at: String,
}

/// Response to an autosave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedProgress {
    pub exam_id: ExamId,
    pub answered: u32,
    pub remaining_sec: i64,
    pub saves: i64,
}

/// Outcome of a submit. The only place correctness is revealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    pub exam_id: ExamId,
    pub passed: bool,
    pub score: u32,
    pub total: u32,
    pub score_pct: u32,
    pub pass_pct: u32,
}
