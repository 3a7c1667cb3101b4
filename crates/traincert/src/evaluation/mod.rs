//! Employer practical evaluations: one human-attested record per enrollment.

pub mod engine;
pub mod types;

pub use types::{EmployerEvaluation, EvaluationInput};

pub use engine::{practical_evaluation, record_evaluation, EVALUATOR_ROLES};
