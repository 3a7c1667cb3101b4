//! Traincert: training progression and credential issuance engine.
//!
//! Tracks learners through ordered course modules behind four-step gates,
//! runs randomized resumable exams, aggregates completion signals into an
//! eligibility verdict, and issues Ed25519-signed certificates that can be
//! verified by public code and renewed on a fixed cycle.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod content;
pub mod credential;
pub mod crypto;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod exam;
pub mod gate;
pub mod ids;
pub mod notify;
pub mod progress;
pub mod storage;
pub mod time;

// Re-export primary types
pub use auth::{Actor, Role};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Result, TrainError};
pub use ids::{CertificateId, CourseId, EnrollmentId, ExamId, ItemId, ModuleId, PaperId};
pub use storage::Database;
pub use time::{Clock, ManualClock, SystemClock};

// Re-export component types
pub use catalog::{Course, Module, NewModule};
pub use content::{ItemDraft, ItemEdit, ItemStatus, QuizItem, QuizItemRevision};
pub use credential::{
    Certificate, CertificatePayload, IssueRequest, IssuedCertificate, RecertStatus, Verification,
};
pub use crypto::keys::IssuerKey;
pub use eligibility::Eligibility;
pub use evaluation::{EmployerEvaluation, EvaluationInput};
pub use exam::{ExamResult, ExamStatus, LearnerItem, ResumedExam, SavedProgress, StartExam, StartedExam};
pub use gate::{GateState, GateStep, MarkOutcome};
pub use notify::{LogNotifier, Notification, Notifier};
pub use progress::{Enrollment, ResumeDecision, ResumeState, ResumeTier};
