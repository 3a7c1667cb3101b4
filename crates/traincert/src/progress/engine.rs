//! Progress engine: enrollment persistence, progress maths, counters and
//! resume resolution.

use std::collections::HashSet;

use rusqlite::{params, Connection, Row};

use crate::catalog::{self, Module};
use crate::error::{Result, TrainError};
use crate::ids::{CourseId, EnrollmentId};
use crate::storage::optional;

use super::resume::{resolve_with, ResumeContext, DEFAULT_STRATEGIES};
use super::types::*;

/// Gate steps completed, across all modules.
pub const COUNTER_STEPS_COMPLETED: &str = "steps_completed";
/// Exam autosaves.
pub const COUNTER_EXAM_ANSWERS_SAVED: &str = "exam_answers_saved";

const ENROLLMENT_COLUMNS: &str =
    "id, learner_id, course_id, progress_pct, resume_state, passed, created_at, updated_at";

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    let resume: Option<String> = row.get(4)?;
    Ok(Enrollment {
        id: EnrollmentId(row.get(0)?),
        learner_id: row.get(1)?,
        course_id: CourseId(row.get(2)?),
        progress_pct: row.get(3)?,
        // A malformed pointer is treated as absent; resume falls through.
        resume_state: resume.and_then(|s| serde_json::from_str(&s).ok()),
        passed: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// ---------------------------------------------------------------------------
// Enrollments
// ---------------------------------------------------------------------------

/// Return the learner's enrollment in a course, creating it on first access.
pub fn ensure_enrollment(
    conn: &Connection,
    learner_id: &str,
    course_id: &CourseId,
    now: &str,
) -> Result<Enrollment> {
    if learner_id.trim().is_empty() {
        return Err(TrainError::InvalidInput("learner id is required".into()));
    }
    let inserted = conn.execute(
        "INSERT INTO enrollments (id, learner_id, course_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (learner_id, course_id) DO NOTHING",
        params![EnrollmentId::generate().0, learner_id, course_id.0, now],
    )?;
    if inserted > 0 {
        log::info!("enrolled {learner_id} in {course_id}");
    }
    find_enrollment(conn, learner_id, course_id)?
        .ok_or_else(|| TrainError::Storage("enrollment vanished after insert".into()))
}

/// The learner's enrollment in a course, if any.
pub fn find_enrollment(
    conn: &Connection,
    learner_id: &str,
    course_id: &CourseId,
) -> Result<Option<Enrollment>> {
    optional(conn.query_row(
        &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE learner_id = ?1 AND course_id = ?2"),
        params![learner_id, course_id.0],
        enrollment_from_row,
    ))
}

/// Look up an enrollment by id.
pub fn enrollment_by_id(conn: &Connection, id: &EnrollmentId) -> Result<Enrollment> {
    optional(conn.query_row(
        &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1"),
        [&id.0],
        enrollment_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("enrollment {id}")))
}

/// Replace the resume pointer.
pub fn set_resume_state(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
    state: &ResumeState,
    now: &str,
) -> Result<()> {
    let json = serde_json::to_string(state)?;
    conn.execute(
        "UPDATE enrollments SET resume_state = ?1, updated_at = ?2 WHERE id = ?3",
        params![json, now, enrollment_id.0],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress percentage
// ---------------------------------------------------------------------------

/// Progress for a course of `total` modules.
///
/// `steps_by_order` holds the number of completed gate steps (0..=4) for each
/// module the learner has touched. Complete modules count fully; the
/// lowest-ordered incomplete module adds a quarter per step done.
pub fn progress_pct(total: usize, steps_by_order: &[(u32, u8)]) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = steps_by_order.iter().filter(|(_, s)| *s >= 4).count();
    let partial = steps_by_order
        .iter()
        .filter(|(_, s)| *s < 4)
        .min_by_key(|(order, _)| *order)
        .map(|(_, s)| *s as usize)
        .unwrap_or(0);
    let quarters = (completed * 4 + partial).min(total * 4);
    (100 * quarters / (total * 4)) as u8
}

/// Raise the stored percentage to `pct` if higher. Returns the stored value.
pub fn raise_progress(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
    pct: u8,
    now: &str,
) -> Result<u8> {
    let stored: u8 = conn.query_row(
        "UPDATE enrollments SET progress_pct = MAX(progress_pct, ?1), updated_at = ?2
         WHERE id = ?3 RETURNING progress_pct",
        params![pct.min(100), now, enrollment_id.0],
        |row| row.get(0),
    )?;
    Ok(stored)
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomically add `delta` to a named counter and return the new value.
///
/// One statement; concurrent callers never lose an increment.
pub fn increment_counter(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
    counter: &str,
    delta: i64,
) -> Result<i64> {
    let count = conn.query_row(
        "INSERT INTO progress_counters (enrollment_id, counter, count) VALUES (?1, ?2, ?3)
         ON CONFLICT (enrollment_id, counter) DO UPDATE SET count = count + excluded.count
         RETURNING count",
        params![enrollment_id.0, counter, delta],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Current counter value (0 when never incremented).
pub fn counter_value(conn: &Connection, enrollment_id: &EnrollmentId, counter: &str) -> Result<i64> {
    Ok(optional(conn.query_row(
        "SELECT count FROM progress_counters WHERE enrollment_id = ?1 AND counter = ?2",
        params![enrollment_id.0, counter],
        |row| row.get(0),
    ))?
    .unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

/// Orders of modules with at least one passed quiz attempt.
pub fn passed_quiz_orders(conn: &Connection, enrollment_id: &EnrollmentId) -> Result<HashSet<u32>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT m.ord FROM quiz_attempts a
         JOIN modules m ON m.id = a.module_id
         WHERE a.enrollment_id = ?1 AND a.passed = 1",
    )?;
    let orders = stmt
        .query_map([&enrollment_id.0], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<u32>>>()?;
    Ok(orders)
}

/// Module order the learner should land on when returning to a course.
///
/// Does not create an enrollment; a learner who never started gets module 1.
pub fn resolve_resume_order(
    conn: &Connection,
    course_slug: &str,
    learner_id: &str,
) -> Result<ResumeDecision> {
    let course = catalog::course_by_slug(conn, course_slug)?;
    let modules: Vec<Module> = catalog::course_modules(conn, &course.id)?;

    let mut ctx = ResumeContext {
        module_orders: modules.iter().map(|m| m.order).collect(),
        ..Default::default()
    };
    if let Some(enrollment) = find_enrollment(conn, learner_id, &course.id)? {
        ctx.stored = enrollment.resume_state;
        ctx.passed_orders = passed_quiz_orders(conn, &enrollment.id)?;
    }

    let decision = resolve_with(&DEFAULT_STRATEGIES, &ctx);
    log::debug!(
        "resume {learner_id}/{course_slug}: order {} via {:?}",
        decision.order,
        decision.tier
    );
    Ok(decision)
}
