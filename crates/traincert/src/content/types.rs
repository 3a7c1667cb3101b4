//! Quiz item data structures.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::ids::ItemId;

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Draft,
    Published,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Draft => "draft",
            ItemStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ItemStatus::Draft),
            "published" => Ok(ItemStatus::Published),
            other => Err(TrainError::DataIntegrity(format!(
                "unknown item status '{other}'"
            ))),
        }
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: ItemId,
    pub bank_id: String,
    pub locale: String,
    pub prompt: String,
    pub choices: Vec<String>,
    /// Index into `choices`.
    pub correct_choice: u32,
    pub status: ItemStatus,
    pub version: u32,
    pub updated_by: String,
    pub updated_at: String,
}

/// Fields for a new item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDraft {
    pub bank_id: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_choice: u32,
}

fn default_locale() -> String {
    "en".to_string()
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemEdit {
    pub prompt: Option<String>,
    pub choices: Option<Vec<String>>,
    pub correct_choice: Option<u32>,
    pub locale: Option<String>,
}

/// What a revision recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionAction {
    Create,
    Edit,
    Publish,
    Unpublish,
}

impl RevisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionAction::Create => "create",
            RevisionAction::Edit => "edit",
            RevisionAction::Publish => "publish",
            RevisionAction::Unpublish => "unpublish",
        }
    }
}

/// Immutable before/after snapshot of one transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItemRevision {
    pub seq: i64,
    pub item_id: ItemId,
    pub version: u32,
    pub action: String,
    pub actor: String,
    pub before: Option<QuizItem>,
    pub after: QuizItem,
    pub created_at: String,
}
