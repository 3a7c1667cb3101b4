//! Exam engine.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

use crate::auth::Actor;
use crate::content::{self, QuizItem};
use crate::error::{Result, TrainError};
use crate::ids::{EnrollmentId, ExamId, ItemId, PaperId};
use crate::progress::{self, Enrollment, COUNTER_EXAM_ANSWERS_SAVED};
use crate::storage::{optional, Database};
use crate::time::to_rfc3339;

use super::types::*;

// ---------------------------------------------------------------------------
// Lapse handling
// ---------------------------------------------------------------------------

/// A transaction either finishes or finds the session out of time. The
/// lapse is committed before it is reported.
enum Step<T> {
    Done(T),
    Lapsed(ExamId),
}

fn run<T, F>(db: &Database, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<Step<T>>,
{
    match db.with_tx(TransactionBehavior::Immediate, f)? {
        Step::Done(v) => Ok(v),
        Step::Lapsed(id) => Err(TrainError::Expired(format!("exam {id} ran out of time"))),
    }
}

fn expire_session(conn: &Connection, id: &ExamId, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE exam_sessions SET status = 'expired', remaining_sec = 0, updated_at = ?1
         WHERE id = ?2 AND status = 'in_progress'",
        params![now, id.0],
    )?;
    log::info!("exam {id} expired");
    Ok(())
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

const SESSION_COLUMNS: &str = "id, paper_id, learner_id, enrollment_id, status, answers, \
     remaining_sec, started_at, updated_at, submitted_at, score, total, passed";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<(ExamSession, String, String)> {
    Ok((
        ExamSession {
            id: ExamId(row.get(0)?),
            paper_id: PaperId(row.get(1)?),
            learner_id: row.get(2)?,
            enrollment_id: EnrollmentId(row.get(3)?),
            status: ExamStatus::InProgress,
            answers: BTreeMap::new(),
            remaining_sec: row.get(6)?,
            started_at: row.get(7)?,
            updated_at: row.get(8)?,
            submitted_at: row.get(9)?,
            score: row.get(10)?,
            total: row.get(11)?,
            passed: row.get(12)?,
        },
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_session((mut s, status, answers): (ExamSession, String, String)) -> Result<ExamSession> {
    s.status = ExamStatus::parse(&status)?;
    s.answers = serde_json::from_str(&answers)?;
    Ok(s)
}

/// Load a session by exam id.
pub fn load_session(conn: &Connection, id: &ExamId) -> Result<ExamSession> {
    let raw = optional(conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE id = ?1"),
        [&id.0],
        session_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("exam {id}")))?;
    decode_session(raw)
}

/// The learner's most recently updated in-progress session.
pub fn find_in_progress(conn: &Connection, learner_id: &str) -> Result<Option<ExamSession>> {
    optional(conn.query_row(
        &format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions
             WHERE learner_id = ?1 AND status = 'in_progress'
             ORDER BY updated_at DESC, rowid DESC LIMIT 1"
        ),
        [learner_id],
        session_from_row,
    ))?
    .map(decode_session)
    .transpose()
}

fn load_paper(conn: &Connection, id: &PaperId) -> Result<ExamPaper> {
    let row = optional(conn.query_row(
        "SELECT id, bank_id, course_id, locale, item_ids, requested, created_at
         FROM exam_papers WHERE id = ?1",
        [&id.0],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("exam paper {id}")))?;
    Ok(ExamPaper {
        id: PaperId(row.0),
        bank_id: row.1,
        course_id: row.2.as_str().into(),
        locale: row.3,
        item_ids: serde_json::from_str(&row.4)?,
        requested: row.5,
        created_at: row.6,
    })
}

/// Paper items in presentation order.
fn paper_items(conn: &Connection, paper: &ExamPaper) -> Result<Vec<QuizItem>> {
    let mut by_id: HashMap<ItemId, QuizItem> = content::items_by_ids(conn, &paper.item_ids)?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();
    paper
        .item_ids
        .iter()
        .map(|id| {
            by_id.remove(id).ok_or_else(|| {
                TrainError::DataIntegrity(format!("paper {} references missing item {id}", paper.id))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Paper generation
// ---------------------------------------------------------------------------

/// Pick `min(count, pool.len())` distinct items uniformly at random.
pub fn draw_items<R: Rng + ?Sized>(mut pool: Vec<QuizItem>, count: usize, rng: &mut R) -> Vec<QuizItem> {
    let n = count.min(pool.len());
    let (chosen, _) = pool.partial_shuffle(rng, n);
    chosen.to_vec()
}

/// Start an exam for an enrollment.
///
/// Draws from published items of the bank in the requested locale. An
/// undersized bank yields fewer items; an empty one yields none and no
/// session. A lapsed in-progress session is expired first; a live one is a
/// `Conflict`.
pub fn start_exam<R: Rng + ?Sized>(
    db: &Database,
    enrollment: &Enrollment,
    req: &StartExam,
    duration_sec: u32,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<StartedExam> {
    if req.count == 0 {
        return Err(TrainError::InvalidInput("count must be at least 1".into()));
    }
    if req.bank_id.trim().is_empty() {
        return Err(TrainError::InvalidInput("bank_id is required".into()));
    }
    let ts = to_rfc3339(now);

    db.with_tx(TransactionBehavior::Immediate, |tx| {
        if let Some(current) = find_in_progress(tx, &enrollment.learner_id)? {
            if current.is_lapsed(now)? {
                expire_session(tx, &current.id, &ts)?;
            } else {
                return Err(TrainError::Conflict(format!(
                    "exam {} is already in progress",
                    current.id
                )));
            }
        }

        let pool = content::published_items(tx, &req.bank_id, &req.locale)?;
        let chosen = draw_items(pool, req.count as usize, rng);
        let delivered = chosen.len() as u32;
        if delivered < req.count {
            log::warn!(
                "bank {} ({}) delivered {delivered} of {} requested items",
                req.bank_id,
                req.locale,
                req.count
            );
        }
        let items: Vec<LearnerItem> = chosen.iter().map(LearnerItem::from).collect();
        if chosen.is_empty() {
            return Ok(StartedExam {
                exam_id: None,
                locale: req.locale.clone(),
                items,
                requested: req.count,
                delivered,
                remaining_sec: 0,
            });
        }

        let paper_id = PaperId::generate();
        let item_ids: Vec<ItemId> = chosen.iter().map(|i| i.id.clone()).collect();
        tx.execute(
            "INSERT INTO exam_papers (id, bank_id, course_id, locale, item_ids, requested, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                paper_id.0,
                req.bank_id,
                enrollment.course_id.0,
                req.locale,
                serde_json::to_string(&item_ids)?,
                req.count,
                ts
            ],
        )?;

        let exam_id = ExamId::generate();
        tx.execute(
            "INSERT INTO exam_sessions
                (id, paper_id, learner_id, enrollment_id, status, answers, remaining_sec, started_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'in_progress', '{}', ?5, ?6, ?6)",
            params![
                exam_id.0,
                paper_id.0,
                enrollment.learner_id,
                enrollment.id.0,
                duration_sec,
                ts
            ],
        )?;
        log::info!(
            "started exam {exam_id} for {} with {delivered} items",
            enrollment.learner_id
        );

        Ok(StartedExam {
            exam_id: Some(exam_id),
            locale: req.locale.clone(),
            items,
            requested: req.count,
            delivered,
            remaining_sec: i64::from(duration_sec),
        })
    })
}

// ---------------------------------------------------------------------------
// Resume / save / submit
// ---------------------------------------------------------------------------

/// The learner's in-progress exam with full item text, or `None`.
pub fn resume_exam(db: &Database, learner_id: &str, now: DateTime<Utc>) -> Result<Option<ResumedExam>> {
    run(db, |tx| {
        let Some(session) = find_in_progress(tx, learner_id)? else {
            return Ok(Step::Done(None));
        };
        if session.is_lapsed(now)? {
            expire_session(tx, &session.id, &to_rfc3339(now))?;
            return Ok(Step::Lapsed(session.id));
        }
        let paper = load_paper(tx, &session.paper_id)?;
        let items = paper_items(tx, &paper)?;
        Ok(Step::Done(Some(ResumedExam {
            remaining_sec: session.remaining_at(now)?,
            exam_id: session.id,
            locale: paper.locale,
            items: items.iter().map(LearnerItem::from).collect(),
            answers: session.answers,
            started_at: session.started_at,
        })))
    })
}

/// Load a session the actor may write to, checking status and time.
fn writable_session(
    conn: &Connection,
    actor: &Actor,
    exam_id: &ExamId,
    now: DateTime<Utc>,
) -> Result<Step<ExamSession>> {
    let session = load_session(conn, exam_id)?;
    actor.require_owner(&session.learner_id)?;
    match session.status {
        ExamStatus::Submitted => Err(TrainError::Conflict(format!(
            "exam {exam_id} was already submitted"
        ))),
        ExamStatus::Expired => Err(TrainError::Expired(format!("exam {exam_id} has expired"))),
        ExamStatus::InProgress => {
            if session.is_lapsed(now)? {
                expire_session(conn, exam_id, &to_rfc3339(now))?;
                Ok(Step::Lapsed(session.id))
            } else {
                Ok(Step::Done(session))
            }
        }
    }
}

fn check_answers(items: &[QuizItem], answers: &BTreeMap<ItemId, u32>) -> Result<()> {
    for (id, choice) in answers {
        let item = items
            .iter()
            .find(|i| &i.id == id)
            .ok_or_else(|| TrainError::InvalidInput(format!("item {id} is not on this paper")))?;
        if *choice as usize >= item.choices.len() {
            return Err(TrainError::InvalidInput(format!(
                "choice {choice} is out of range for item {id}"
            )));
        }
    }
    Ok(())
}

/// Persist partial answers and the client's remaining time.
///
/// The stored budget never grows: it is the smaller of what the client
/// reports and what the server computes.
pub fn save_exam_progress(
    db: &Database,
    actor: &Actor,
    exam_id: &ExamId,
    answers: BTreeMap<ItemId, u32>,
    remaining_sec: Option<i64>,
    now: DateTime<Utc>,
) -> Result<SavedProgress> {
    run(db, |tx| {
        let mut session = match writable_session(tx, actor, exam_id, now)? {
            Step::Done(s) => s,
            Step::Lapsed(id) => return Ok(Step::Lapsed(id)),
        };
        let paper = load_paper(tx, &session.paper_id)?;
        let items = paper_items(tx, &paper)?;
        check_answers(&items, &answers)?;

        let server_remaining = session.remaining_at(now)?;
        let remaining = remaining_sec
            .map(|r| r.clamp(0, server_remaining))
            .unwrap_or(server_remaining);
        session.answers.extend(answers);

        tx.execute(
            "UPDATE exam_sessions SET answers = ?1, remaining_sec = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                serde_json::to_string(&session.answers)?,
                remaining,
                to_rfc3339(now),
                exam_id.0
            ],
        )?;
        let saves =
            progress::increment_counter(tx, &session.enrollment_id, COUNTER_EXAM_ANSWERS_SAVED, 1)?;

        Ok(Step::Done(SavedProgress {
            exam_id: session.id,
            answered: session.answers.len() as u32,
            remaining_sec: remaining,
            saves,
        }))
    })
}

/// Count answers matching the stored correct choice.
pub fn score_answers(items: &[QuizItem], answers: &BTreeMap<ItemId, u32>) -> u32 {
    items
        .iter()
        .filter(|item| answers.get(&item.id) == Some(&item.correct_choice))
        .count() as u32
}

/// Grade and close a session. `answers` are merged over any autosaved ones.
///
/// A pass marks the enrollment as passed.
pub fn submit_exam(
    db: &Database,
    actor: &Actor,
    exam_id: &ExamId,
    answers: BTreeMap<ItemId, u32>,
    pass_pct: u32,
    now: DateTime<Utc>,
) -> Result<ExamResult> {
    run(db, |tx| {
        let mut session = match writable_session(tx, actor, exam_id, now)? {
            Step::Done(s) => s,
            Step::Lapsed(id) => return Ok(Step::Lapsed(id)),
        };
        let paper = load_paper(tx, &session.paper_id)?;
        let items = paper_items(tx, &paper)?;
        check_answers(&items, &answers)?;
        session.answers.extend(answers);

        let total = items.len() as u32;
        let score = score_answers(&items, &session.answers);
        let passed = total > 0 && score * 100 >= pass_pct * total;
        let score_pct = if total == 0 { 0 } else { score * 100 / total };
        let ts = to_rfc3339(now);

        tx.execute(
            "UPDATE exam_sessions
             SET status = 'submitted', answers = ?1, remaining_sec = ?2, updated_at = ?3,
                 submitted_at = ?3, score = ?4, total = ?5, passed = ?6
             WHERE id = ?7",
            params![
                serde_json::to_string(&session.answers)?,
                session.remaining_at(now)?,
                ts,
                score,
                total,
                passed,
                exam_id.0
            ],
        )?;
        if passed {
            tx.execute(
                "UPDATE enrollments SET passed = 1, updated_at = ?1 WHERE id = ?2",
                params![ts, session.enrollment_id.0],
            )?;
        }
        log::info!(
            "exam {exam_id} submitted by {}: {score}/{total} passed={passed}",
            session.learner_id
        );

        Ok(Step::Done(ExamResult {
            exam_id: session.id,
            passed,
            score,
            total,
            score_pct,
            pass_pct,
        }))
    })
}

/// Highest percentage among passed exams of an enrollment.
pub fn best_passed_score_pct(conn: &Connection, enrollment_id: &EnrollmentId) -> Result<Option<u32>> {
    let best: Option<u32> = conn.query_row(
        "SELECT MAX(score * 100 / total) FROM exam_sessions
         WHERE enrollment_id = ?1 AND status = 'submitted' AND passed = 1 AND total > 0",
        [&enrollment_id.0],
        |row| row.get(0),
    )?;
    Ok(best)
}
