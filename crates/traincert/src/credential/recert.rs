//! Recertification policy.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::Result;
use crate::ids::CertificateId;
use crate::storage::optional;
use crate::time::{add_years, parse_rfc3339, to_rfc3339};

use super::types::RecertStatus;

/// Renewal status of `learner_id`'s most recent non-revoked certificate.
///
/// Only certificates whose enrollment belongs to `learner_id` are
/// considered. `due` holds from `issued_at + years` onward; without any
/// certificate the learner is never due.
pub fn due_for_recert(
    conn: &Connection,
    learner_id: &str,
    years: u32,
    now: DateTime<Utc>,
) -> Result<RecertStatus> {
    let latest = optional(conn.query_row(
        "SELECT c.id, c.issued_at FROM certificates c
         JOIN enrollments e ON e.id = c.enrollment_id
         WHERE e.learner_id = ?1 AND c.revoked = 0
         ORDER BY c.issued_at DESC, c.rowid DESC LIMIT 1",
        [learner_id],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    ))?;

    let Some((id, issued_at)) = latest else {
        return Ok(RecertStatus {
            has_certificate: false,
            due: false,
            current_until: None,
            certificate_id: None,
        });
    };

    let current_until = add_years(parse_rfc3339(&issued_at)?, years)?;
    Ok(RecertStatus {
        has_certificate: true,
        due: now >= current_until,
        current_until: Some(to_rfc3339(current_until)),
        certificate_id: Some(CertificateId(id)),
    })
}
