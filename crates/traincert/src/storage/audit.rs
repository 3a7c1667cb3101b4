//! Append-only audit log.
//!
//! Rows are written with the same connection (and therefore the same
//! transaction) as the mutation they describe, so an audit row exists iff the
//! mutation committed.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;

/// One audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub seq: i64,
    pub entity_kind: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub detail: serde_json::Value,
    pub at: String,
}

/// Append an entry. Call from inside the mutating transaction.
pub fn append(
    conn: &Connection,
    entity_kind: &str,
    entity_id: &str,
    action: &str,
    actor: &str,
    detail: &serde_json::Value,
    at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (entity_kind, entity_id, action, actor, detail, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![entity_kind, entity_id, action, actor, detail.to_string(), at],
    )?;
    Ok(())
}

/// All entries for one entity, oldest first.
pub fn entries_for(conn: &Connection, entity_kind: &str, entity_id: &str) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, entity_kind, entity_id, action, actor, detail, at
         FROM audit_log WHERE entity_kind = ?1 AND entity_id = ?2 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![entity_kind, entity_id], |row| {
        let detail: String = row.get(5)?;
        Ok(AuditEntry {
            seq: row.get(0)?,
            entity_kind: row.get(1)?,
            entity_id: row.get(2)?,
            action: row.get(3)?,
            actor: row.get(4)?,
            detail: serde_json::from_str(&detail).unwrap_or(serde_json::Value::Null),
            at: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
