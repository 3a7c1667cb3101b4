//! Evaluation data structures.

use serde::{Deserialize, Serialize};

use crate::ids::EnrollmentId;

/// What an evaluator submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub evaluator_name: String,
    /// Calendar date of the hands-on evaluation, `YYYY-MM-DD`.
    pub evaluated_on: String,
    pub practical_pass: bool,
    /// Opaque object-storage URL of the signature image.
    #[serde(default)]
    pub evaluator_signature: Option<String>,
    #[serde(default)]
    pub trainee_signature: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Stored evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployerEvaluation {
    pub id: String,
    pub enrollment_id: EnrollmentId,
    pub evaluator_id: String,
    pub evaluator_name: String,
    pub evaluated_on: String,
    pub practical_pass: bool,
    pub evaluator_signature: Option<String>,
    pub trainee_signature: Option<String>,
    pub notes: Option<String>,
    /// Role the evaluation was recorded under.
    pub recorded_by: String,
    pub updated_at: String,
}
