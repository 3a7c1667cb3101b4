//! Certificate data structures.

use serde::{Deserialize, Serialize};

use crate::ids::{CertificateId, EnrollmentId};

/// Version tag inside every payload.
pub const PAYLOAD_VERSION: u32 = 1;

/// The signed content of a certificate.
///
/// Fields are declared in lexicographic order and serialized compactly, so
/// the JSON bytes are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificatePayload {
    pub course_slug: String,
    pub course_title: String,
    pub enrollment_id: EnrollmentId,
    pub expires_at: String,
    pub issued_at: String,
    pub issuer: String,
    pub key_id: String,
    pub learner_id: String,
    pub practical_verified: bool,
    pub score: u32,
    pub verification_code: String,
    pub version: u32,
}

impl CertificatePayload {
    /// Canonical bytes covered by the signature.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A stored certificate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub enrollment_id: EnrollmentId,
    pub verification_code: String,
    pub signed_payload: String,
    pub signature: String,
    pub key_id: String,
    pub issued_at: String,
    pub expires_at: String,
    pub revoked: bool,
    pub revoked_at: Option<String>,
    pub revoked_reason: Option<String>,
    pub supersedes: Option<CertificateId>,
}

/// Input for issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub learner_id: String,
    pub course_slug: String,
    /// Score to print; defaults to the best passed exam score.
    #[serde(default)]
    pub score: Option<u32>,
}

/// What issuance hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub id: CertificateId,
    pub verification_code: String,
    /// Link for the rendered document's scannable code.
    pub verification_url: String,
    pub issued_at: String,
    pub expires_at: String,
    pub supersedes: Option<CertificateId>,
    pub payload: CertificatePayload,
}

/// Result of verifying by code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// The stored signature matches the stored payload and this issuer.
    pub valid: bool,
    /// `now > expires_at`, regardless of `valid`.
    pub expired: bool,
    pub revoked: bool,
    /// Live practical-evaluation status. Display only; does not affect `valid`.
    pub practical_verified: bool,
    /// Names of failed checks: `signature`, `expired`, `revoked`.
    pub reasons: Vec<String>,
    pub certificate_id: CertificateId,
    pub details: Option<CertificatePayload>,
}

/// Result of checking a payload against a public key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineVerification {
    pub valid: bool,
    pub expired: bool,
}

/// Renewal status of a learner's latest certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecertStatus {
    pub has_certificate: bool,
    pub due: bool,
    pub current_until: Option<String>,
    pub certificate_id: Option<CertificateId>,
}
