//! Evaluation engine: upsert and lookup.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde_json::json;

use crate::auth::{Actor, Role};
use crate::crypto::random;
use crate::error::{Result, TrainError};
use crate::ids::EnrollmentId;
use crate::storage::{audit, optional};

use super::types::*;

/// Roles allowed to record an evaluation.
pub const EVALUATOR_ROLES: [Role; 3] = [Role::Evaluator, Role::Trainer, Role::Staff];

/// Insert or replace the evaluation for an enrollment and audit it.
///
/// The evaluator identity is the calling actor. Run inside a transaction so
/// the audit row commits with the upsert.
pub fn record_evaluation(
    conn: &Connection,
    actor: &Actor,
    enrollment_id: &EnrollmentId,
    input: &EvaluationInput,
    now: &str,
) -> Result<EmployerEvaluation> {
    actor.require_any(&EVALUATOR_ROLES)?;
    if input.evaluator_name.trim().is_empty() {
        return Err(TrainError::InvalidInput("evaluator_name is required".into()));
    }
    NaiveDate::parse_from_str(&input.evaluated_on, "%Y-%m-%d").map_err(|_| {
        TrainError::InvalidInput(format!(
            "evaluated_on '{}' is not a YYYY-MM-DD date",
            input.evaluated_on
        ))
    })?;

    conn.execute(
        "INSERT INTO employer_evaluations
            (id, enrollment_id, evaluator_id, evaluator_name, evaluated_on, practical_pass,
             evaluator_signature, trainee_signature, notes, recorded_by, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (enrollment_id) DO UPDATE SET
            evaluator_id = excluded.evaluator_id,
            evaluator_name = excluded.evaluator_name,
            evaluated_on = excluded.evaluated_on,
            practical_pass = excluded.practical_pass,
            evaluator_signature = excluded.evaluator_signature,
            trainee_signature = excluded.trainee_signature,
            notes = excluded.notes,
            recorded_by = excluded.recorded_by,
            updated_at = excluded.updated_at",
        params![
            random::new_id("eval"),
            enrollment_id.0,
            actor.user_id,
            input.evaluator_name,
            input.evaluated_on,
            input.practical_pass,
            input.evaluator_signature,
            input.trainee_signature,
            input.notes,
            actor.role.as_str(),
            now
        ],
    )?;

    let stored = practical_evaluation(conn, enrollment_id)?
        .ok_or_else(|| TrainError::Storage("evaluation missing after upsert".into()))?;
    audit::append(
        conn,
        "evaluation",
        &enrollment_id.0,
        "record",
        &actor.user_id,
        &json!({ "practical_pass": stored.practical_pass, "evaluated_on": stored.evaluated_on }),
        now,
    )?;
    log::info!(
        "evaluation for {enrollment_id} recorded by {}: practical_pass={}",
        actor.user_id,
        stored.practical_pass
    );
    Ok(stored)
}

/// The evaluation recorded for an enrollment, if any.
pub fn practical_evaluation(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
) -> Result<Option<EmployerEvaluation>> {
    optional(conn.query_row(
        "SELECT id, enrollment_id, evaluator_id, evaluator_name, evaluated_on, practical_pass,
                evaluator_signature, trainee_signature, notes, recorded_by, updated_at
         FROM employer_evaluations WHERE enrollment_id = ?1",
        [&enrollment_id.0],
        |row| {
            Ok(EmployerEvaluation {
                id: row.get(0)?,
                enrollment_id: EnrollmentId(row.get(1)?),
                evaluator_id: row.get(2)?,
                evaluator_name: row.get(3)?,
                evaluated_on: row.get(4)?,
                practical_pass: row.get(5)?,
                evaluator_signature: row.get(6)?,
                trainee_signature: row.get(7)?,
                notes: row.get(8)?,
                recorded_by: row.get(9)?,
                updated_at: row.get(10)?,
            })
        },
    ))
}
