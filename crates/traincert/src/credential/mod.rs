//! Certificates: issuance, verification, revocation and recertification.
//!
//! A certificate stores the exact canonical payload bytes that were signed.
//! Verification never re-serializes the payload; it re-signs the stored
//! bytes and compares signatures in constant time. `valid`, `expired` and
//! `revoked` are independent answers.

pub mod engine;
pub mod recert;
pub mod types;

pub use types::{
    Certificate, CertificatePayload, IssueRequest, IssuedCertificate, OfflineVerification,
    RecertStatus, Verification, PAYLOAD_VERSION,
};

pub use engine::{
    certificate_by_code, certificate_id_for, current_certificate, issue_certificate,
    revoke_certificate, verify_certificate, verify_offline, ISSUER_ROLES,
};
pub use recert::due_for_recert;
