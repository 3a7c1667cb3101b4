//! Exam sessions: randomized papers, autosave, resume and scoring.
//!
//! A learner has at most one `in_progress` session; a partial unique index
//! enforces it and a second start gets `Conflict`. Time runs out lazily: a
//! session whose budget has lapsed is marked `expired` the next time anyone
//! touches it, and the caller gets `Expired`.

pub mod engine;
pub mod types;

pub use types::{
    ExamPaper, ExamResult, ExamSession, ExamStatus, LearnerItem, ResumedExam, SavedProgress,
    StartExam, StartedExam,
};

pub use engine::{
    best_passed_score_pct, draw_items, find_in_progress, load_session, resume_exam,
    save_exam_progress, score_answers, start_exam, submit_exam,
};
