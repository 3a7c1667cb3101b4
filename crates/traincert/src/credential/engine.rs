//! Credential engine: issue, verify, revoke.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::auth::{Actor, Role};
use crate::catalog;
use crate::config::EngineConfig;
use crate::crypto::keys::IssuerKey;
use crate::crypto::{random, signing};
use crate::error::{Result, TrainError};
use crate::evaluation;
use crate::exam;
use crate::ids::{CertificateId, EnrollmentId};
use crate::progress;
use crate::storage::{audit, optional, Database};
use crate::time::{add_years, parse_rfc3339, to_rfc3339};

use super::types::*;

/// Roles allowed to issue certificates.
pub const ISSUER_ROLES: [Role; 2] = [Role::System, Role::Staff];

const CODE_ATTEMPTS: usize = 5;

const CERT_COLUMNS: &str = "id, enrollment_id, verification_code, signed_payload, signature, \
     key_id, issued_at, expires_at, revoked, revoked_at, revoked_reason, supersedes";

fn cert_from_row(row: &Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: CertificateId(row.get(0)?),
        enrollment_id: EnrollmentId(row.get(1)?),
        verification_code: row.get(2)?,
        signed_payload: row.get(3)?,
        signature: row.get(4)?,
        key_id: row.get(5)?,
        issued_at: row.get(6)?,
        expires_at: row.get(7)?,
        revoked: row.get(8)?,
        revoked_at: row.get(9)?,
        revoked_reason: row.get(10)?,
        supersedes: row.get::<_, Option<String>>(11)?.map(CertificateId),
    })
}

/// Look up a certificate by its public code.
pub fn certificate_by_code(conn: &Connection, code: &str) -> Result<Certificate> {
    optional(conn.query_row(
        &format!("SELECT {CERT_COLUMNS} FROM certificates WHERE verification_code = ?1"),
        [code],
        cert_from_row,
    ))?
    .ok_or_else(|| TrainError::NotFound(format!("certificate '{code}'")))
}

/// Most recent non-revoked certificate of an enrollment.
pub fn current_certificate(
    conn: &Connection,
    enrollment_id: &EnrollmentId,
) -> Result<Option<Certificate>> {
    optional(conn.query_row(
        &format!(
            "SELECT {CERT_COLUMNS} FROM certificates
             WHERE enrollment_id = ?1 AND revoked = 0
             ORDER BY issued_at DESC, rowid DESC LIMIT 1"
        ),
        [&enrollment_id.0],
        cert_from_row,
    ))
}

/// `cert_` + base58 of the first 16 bytes of SHA-256(signature).
pub fn certificate_id_for(signature_b64: &str) -> CertificateId {
    let hash = Sha256::digest(signature_b64.as_bytes());
    CertificateId(format!("cert_{}", bs58::encode(&hash[..16]).into_string()))
}

fn unused_code(conn: &Connection, len: usize) -> Result<String> {
    for _ in 0..CODE_ATTEMPTS {
        let code = random::verification_code(len);
        let taken: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM certificates WHERE verification_code = ?1)",
            [&code],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(code);
        }
        log::warn!("verification code collision, retrying");
    }
    Err(TrainError::Conflict(
        "could not allocate a unique verification code".into(),
    ))
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// Issue a certificate for an enrollment.
///
/// Eligibility is the caller's job. Fails with `AlreadyIssued` while a
/// non-revoked certificate of the enrollment is still current; once it has
/// lapsed the new one records it in `supersedes`.
pub fn issue_certificate(
    db: &Database,
    issuer: &IssuerKey,
    config: &EngineConfig,
    actor: &Actor,
    req: &IssueRequest,
    now: DateTime<Utc>,
) -> Result<IssuedCertificate> {
    actor.require_any(&ISSUER_ROLES)?;
    if let Some(score) = req.score {
        if score > 100 {
            return Err(TrainError::InvalidInput(format!("score {score} is above 100")));
        }
    }
    let issued_at = to_rfc3339(now);
    let expires_at = to_rfc3339(add_years(now, config.recert_years)?);

    let issued = db.with_tx(TransactionBehavior::Immediate, |tx| {
        let course = catalog::course_by_slug(tx, &req.course_slug)?;
        let enrollment = progress::find_enrollment(tx, &req.learner_id, &course.id)?
            .ok_or_else(|| {
                TrainError::NotFound(format!(
                    "enrollment of {} in {}",
                    req.learner_id, req.course_slug
                ))
            })?;

        let supersedes = match current_certificate(tx, &enrollment.id)? {
            Some(prev) if now < parse_rfc3339(&prev.expires_at)? => {
                return Err(TrainError::AlreadyIssued(prev.verification_code));
            }
            Some(prev) => Some(prev.id),
            None => None,
        };

        let score = match req.score {
            Some(s) => s,
            None => exam::best_passed_score_pct(tx, &enrollment.id)?.ok_or_else(|| {
                TrainError::InvalidInput("no passed exam score to certify".into())
            })?,
        };
        let practical_verified = evaluation::practical_evaluation(tx, &enrollment.id)?
            .map(|e| e.practical_pass)
            .unwrap_or(false);

        let code = unused_code(tx, config.verification_code_len)?;
        let payload = CertificatePayload {
            course_slug: course.slug.clone(),
            course_title: course.title.clone(),
            enrollment_id: enrollment.id.clone(),
            expires_at: expires_at.clone(),
            issued_at: issued_at.clone(),
            issuer: config.issuer_name.clone(),
            key_id: issuer.key_id(),
            learner_id: enrollment.learner_id.clone(),
            practical_verified,
            score,
            verification_code: code.clone(),
            version: PAYLOAD_VERSION,
        };
        let bytes = payload.canonical_bytes()?;
        let signed_payload = String::from_utf8(bytes)
            .map_err(|e| TrainError::Serialization(e.to_string()))?;
        let signature = signing::sign_to_base64(issuer.signing_key(), signed_payload.as_bytes());
        let id = certificate_id_for(&signature);

        tx.execute(
            "INSERT INTO certificates
                (id, enrollment_id, verification_code, signed_payload, signature, key_id,
                 issued_at, expires_at, supersedes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.0,
                enrollment.id.0,
                code,
                signed_payload,
                signature,
                payload.key_id,
                issued_at,
                expires_at,
                supersedes.as_ref().map(|s| s.0.clone())
            ],
        )?;
        audit::append(
            tx,
            "certificate",
            &id.0,
            "issue",
            &actor.user_id,
            &json!({
                "enrollment_id": enrollment.id,
                "score": score,
                "supersedes": supersedes,
            }),
            &issued_at,
        )?;

        Ok(IssuedCertificate {
            verification_url: config.verification_url(&code),
            id,
            verification_code: code,
            issued_at: issued_at.clone(),
            expires_at: expires_at.clone(),
            supersedes,
            payload,
        })
    })?;

    log::info!(
        "issued certificate {} to {} for {}",
        issued.id,
        req.learner_id,
        req.course_slug
    );
    Ok(issued)
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// Verify a certificate by its public code.
///
/// `valid` covers the signature and the payload's binding to this row;
/// `expired` is computed from the payload independently. The practical flag
/// is re-read from the live evaluation record.
pub fn verify_certificate(
    db: &Database,
    issuer: &IssuerKey,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Verification> {
    let code = code.trim();
    let cert = db.read_retrying(|c| certificate_by_code(c, code))?;

    let payload: Option<CertificatePayload> = serde_json::from_str(&cert.signed_payload).ok();
    let signature_ok = cert.key_id == issuer.key_id()
        && signing::resign_matches(
            issuer.signing_key(),
            cert.signed_payload.as_bytes(),
            &cert.signature,
        );
    let bound = payload.as_ref().is_some_and(|p| {
        p.verification_code == cert.verification_code && p.enrollment_id == cert.enrollment_id
    });
    let valid = signature_ok && bound;

    // Unreadable payload dates fall back to the row's column.
    let expires_at = match payload.as_ref().map(|p| parse_rfc3339(&p.expires_at)) {
        Some(Ok(at)) => at,
        _ => parse_rfc3339(&cert.expires_at)?,
    };
    let expired = now > expires_at;

    let practical_verified = match db
        .read_retrying(|c| evaluation::practical_evaluation(c, &cert.enrollment_id))
    {
        Ok(eval) => eval.map(|e| e.practical_pass).unwrap_or(false),
        Err(e) => {
            log::warn!("practical evaluation lookup failed for {}: {e}", cert.id);
            false
        }
    };

    let mut reasons = Vec::new();
    if !valid {
        reasons.push("signature".to_string());
    }
    if expired {
        reasons.push("expired".to_string());
    }
    if cert.revoked {
        reasons.push("revoked".to_string());
    }
    log::debug!("verified {}: valid={valid} expired={expired}", cert.id);

    Ok(Verification {
        valid,
        expired,
        revoked: cert.revoked,
        practical_verified,
        reasons,
        certificate_id: cert.id,
        details: payload,
    })
}

/// Check a signed payload with the issuer's public key only.
pub fn verify_offline(
    signed_payload: &str,
    signature_b64: &str,
    public_key_b64: &str,
    now: DateTime<Utc>,
) -> Result<OfflineVerification> {
    let key = IssuerKey::verifying_key_from_base64(public_key_b64)?;
    let valid = signing::verify_from_base64(&key, signed_payload.as_bytes(), signature_b64).is_ok();
    let expires_at = serde_json::from_str::<CertificatePayload>(signed_payload)
        .map_err(TrainError::from)
        .and_then(|p| parse_rfc3339(&p.expires_at));
    let expired = match expires_at {
        Ok(at) => now > at,
        Err(_) if !valid => false,
        Err(e) => return Err(e),
    };
    Ok(OfflineVerification { valid, expired })
}

// ---------------------------------------------------------------------------
// Revoke
// ---------------------------------------------------------------------------

/// Revoke a certificate. Staff only.
pub fn revoke_certificate(
    db: &Database,
    actor: &Actor,
    code: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Certificate> {
    actor.require_any(&[Role::Staff])?;
    if reason.trim().is_empty() {
        return Err(TrainError::InvalidInput("a revocation reason is required".into()));
    }
    let at = to_rfc3339(now);
    db.with_tx(TransactionBehavior::Immediate, |tx| {
        let cert = certificate_by_code(tx, code)?;
        if cert.revoked {
            return Err(TrainError::Conflict(format!(
                "certificate {} is already revoked",
                cert.id
            )));
        }
        tx.execute(
            "UPDATE certificates SET revoked = 1, revoked_at = ?1, revoked_reason = ?2
             WHERE id = ?3 AND revoked = 0",
            params![at, reason, cert.id.0],
        )?;
        audit::append(
            tx,
            "certificate",
            &cert.id.0,
            "revoke",
            &actor.user_id,
            &json!({ "reason": reason }),
            &at,
        )?;
        log::info!("revoked certificate {} by {}", cert.id, actor.user_id);
        certificate_by_code(tx, code)
    })
}
