//! Module gates: four completion steps per module.
//!
//! A module is complete when all four steps are set. The next module unlocks
//! when the previous one is complete; module 1 is always unlocked. Steps only
//! ever go from false to true, and re-marking a set step is a no-op.

pub mod engine;
pub mod types;

pub use types::{GateState, GateStep, MarkOutcome, QuizAttempt};

pub use engine::{gate_states, is_module_unlocked, mark_step_done, record_quiz_attempt};
