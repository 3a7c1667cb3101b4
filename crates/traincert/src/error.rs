//! Error types for traincert.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Engine error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("No identity supplied")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid gate step: {0}")]
    InvalidStep(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Not eligible: {}", reasons.join(", "))]
    Ineligible { reasons: Vec<String> },

    #[error("A current certificate already exists: {0}")]
    AlreadyIssued(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainError {
    /// Wire-level error code reported to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            TrainError::Unauthorized => "unauthorized",
            TrainError::Forbidden(_) => "forbidden",
            TrainError::NotFound(_) => "not_found",
            TrainError::InvalidInput(_) => "invalid_input",
            TrainError::InvalidStep(_) => "invalid_step",
            TrainError::Conflict(_) => "conflict",
            TrainError::Expired(_) => "expired",
            TrainError::Ineligible { .. } => "ineligible",
            TrainError::AlreadyIssued(_) => "already_issued",
            TrainError::InvalidPassphrase => "forbidden",
            _ => "internal",
        }
    }
}

impl From<rusqlite::Error> for TrainError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                TrainError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            rusqlite::Error::QueryReturnedNoRows => TrainError::NotFound("no matching row".into()),
            _ => TrainError::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for TrainError {
    fn from(e: serde_json::Error) -> Self {
        TrainError::Serialization(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, TrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(TrainError::Unauthorized.code(), "unauthorized");
        assert_eq!(TrainError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(TrainError::InvalidStep("x".into()).code(), "invalid_step");
        assert_eq!(TrainError::Expired("x".into()).code(), "expired");
        assert_eq!(
            TrainError::Ineligible {
                reasons: vec!["quiz".into()]
            }
            .code(),
            "ineligible"
        );
        assert_eq!(TrainError::Storage("disk".into()).code(), "internal");
    }

    #[test]
    fn test_ineligible_message_lists_reasons() {
        let e = TrainError::Ineligible {
            reasons: vec!["demos".into(), "practical".into()],
        };
        assert_eq!(e.to_string(), "Not eligible: demos, practical");
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: TrainError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, TrainError::Conflict(_)));
    }
}
