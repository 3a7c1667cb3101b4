//! Gate engine: step marking, unlock checks and module quizzes.

use rusqlite::{params, Connection};

use crate::catalog::{find_module, Module};
use crate::crypto::random;
use crate::error::{Result, TrainError};
use crate::ids::{EnrollmentId, ModuleId};
use crate::progress::{self, Enrollment, ResumeState, COUNTER_STEPS_COMPLETED};

use super::types::*;

/// Mark one step of a module done.
///
/// Creates the gate row on first touch, sets the step (never clears one),
/// recomputes progress and moves the resume pointer to the first incomplete
/// module. Run inside a transaction.
pub fn mark_step_done(
    conn: &Connection,
    enrollment: &Enrollment,
    modules: &[Module],
    module_key: &str,
    step: GateStep,
    now: &str,
) -> Result<MarkOutcome> {
    let module = find_module(modules, module_key)
        .ok_or_else(|| TrainError::NotFound(format!("module '{module_key}'")))?;

    conn.execute(
        "INSERT INTO gate_states (enrollment_id, module_id, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (enrollment_id, module_id) DO NOTHING",
        params![enrollment.id.0, module.id.0, now],
    )?;
    let changed = conn.execute(
        &format!(
            "UPDATE gate_states SET {col} = 1, updated_at = ?1
             WHERE enrollment_id = ?2 AND module_id = ?3 AND {col} = 0",
            col = step.column()
        ),
        params![now, enrollment.id.0, module.id.0],
    )? > 0;

    if changed {
        progress::increment_counter(conn, &enrollment.id, COUNTER_STEPS_COMPLETED, 1)?;
        log::debug!("{} {} {step} done", enrollment.id, module.id);
    }

    let states = gate_states(conn, &enrollment.id)?;
    let steps: Vec<(u32, u8)> = states.iter().map(|g| (g.order, g.steps_done())).collect();
    let pct = progress::progress_pct(modules.len(), &steps);
    let stored_pct = progress::raise_progress(conn, &enrollment.id, pct, now)?;

    let resume_order = frontier(modules, &states);
    progress::set_resume_state(
        conn,
        &enrollment.id,
        &ResumeState {
            order: Some(resume_order as i64),
            tab: Some(step.tab().to_string()),
            at: Some(now.to_string()),
        },
        now,
    )?;

    let state = states
        .into_iter()
        .find(|g| g.module_id == module.id)
        .ok_or_else(|| TrainError::Storage("gate row missing after upsert".into()))?;

    Ok(MarkOutcome {
        state,
        changed,
        progress_pct: stored_pct,
        resume_order,
    })
}

/// First module in order that is not complete, or the last module.
fn frontier(modules: &[Module], states: &[GateState]) -> u32 {
    let mut orders: Vec<u32> = modules.iter().map(|m| m.order).collect();
    orders.sort_unstable();
    let last = orders.last().copied().unwrap_or(1);
    orders
        .into_iter()
        .find(|o| {
            !states
                .iter()
                .any(|g| g.order == *o && g.is_complete())
        })
        .unwrap_or(last)
}

/// All gate rows for an enrollment, by module order.
pub fn gate_states(conn: &Connection, enrollment_id: &EnrollmentId) -> Result<Vec<GateState>> {
    let mut stmt = conn.prepare(
        "SELECT g.enrollment_id, g.module_id, m.ord, g.content_read, g.practice_done,
                g.cards_done, g.quiz_passed, g.updated_at
         FROM gate_states g JOIN modules m ON m.id = g.module_id
         WHERE g.enrollment_id = ?1 ORDER BY m.ord",
    )?;
    let rows = stmt
        .query_map([&enrollment_id.0], |row| {
            Ok(GateState {
                enrollment_id: EnrollmentId(row.get(0)?),
                module_id: ModuleId(row.get(1)?),
                order: row.get(2)?,
                content_read: row.get(3)?,
                practice_done: row.get(4)?,
                cards_done: row.get(5)?,
                quiz_passed: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Whether the module at `order` is unlocked for this enrollment.
pub fn is_module_unlocked(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
    modules: &[Module],
    order: u32,
) -> Result<bool> {
    if !modules.iter().any(|m| m.order == order) {
        return Err(TrainError::NotFound(format!("module order {order}")));
    }
    if order == 1 {
        return Ok(true);
    }
    let states = gate_states(conn, enrollment_id)?;
    Ok(states
        .iter()
        .any(|g| g.order == order - 1 && g.is_complete()))
}

/// Record a module quiz attempt. A passing score also sets `quiz_passed`.
pub fn record_quiz_attempt(
    conn: &Connection,
    enrollment: &Enrollment,
    modules: &[Module],
    module_key: &str,
    score_pct: u32,
    pass_pct: u32,
    now: &str,
) -> Result<(QuizAttempt, Option<MarkOutcome>)> {
    if score_pct > 100 {
        return Err(TrainError::InvalidInput(format!(
            "score_pct {score_pct} is above 100"
        )));
    }
    let module = find_module(modules, module_key)
        .ok_or_else(|| TrainError::NotFound(format!("module '{module_key}'")))?;

    let attempt = QuizAttempt {
        id: random::new_id("qat"),
        enrollment_id: enrollment.id.clone(),
        module_id: module.id.clone(),
        score_pct,
        passed: score_pct >= pass_pct,
        attempted_at: now.to_string(),
    };
    conn.execute(
        "INSERT INTO quiz_attempts (id, enrollment_id, module_id, score_pct, passed, attempted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attempt.id,
            attempt.enrollment_id.0,
            attempt.module_id.0,
            attempt.score_pct,
            attempt.passed,
            attempt.attempted_at
        ],
    )?;

    let gate = if attempt.passed {
        Some(mark_step_done(
            conn,
            enrollment,
            modules,
            module_key,
            GateStep::QuizPassed,
            now,
        )?)
    } else {
        None
    };
    Ok((attempt, gate))
}
