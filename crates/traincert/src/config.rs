//! Engine configuration.
//!
//! Values come from built-in defaults, then `<data_dir>/config.json` when it
//! exists, then environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::random::MIN_CODE_LEN;
use crate::error::{Result, TrainError};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_HOME: &str = "TRAINCERT_HOME";
pub const ENV_PASS_PCT: &str = "TRAINCERT_PASS_PCT";
pub const ENV_EXAM_DURATION: &str = "TRAINCERT_EXAM_DURATION_SEC";
pub const ENV_VERIFY_URL: &str = "TRAINCERT_VERIFY_URL";

/// Tunables for the progression and credential engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum percentage of correct answers to pass a quiz or exam.
    pub pass_pct: u32,
    /// Time budget of a freshly started exam.
    pub exam_duration_sec: u32,
    /// Certificate validity window.
    pub recert_years: u32,
    /// Length of public verification codes.
    pub verification_code_len: usize,
    /// Prefix for verification links; the code is appended.
    pub verification_base_url: String,
    /// Issuer name embedded in every certificate payload.
    pub issuer_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_pct: 80,
            exam_duration_sec: 3600,
            recert_years: 3,
            verification_code_len: 16,
            verification_base_url: "https://verify.example.org/c/".to_string(),
            issuer_name: "Traincert".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from `data_dir/config.json` (if present) and apply env overrides.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                TrainError::InvalidFileFormat(format!("{}: {e}", path.display()))
            })?
        } else {
            Self::default()
        };
        config.apply_env(|k| std::env::var(k).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PASS_PCT) {
            self.pass_pct = v
                .parse()
                .map_err(|_| TrainError::InvalidInput(format!("{ENV_PASS_PCT}={v}")))?;
        }
        if let Some(v) = lookup(ENV_EXAM_DURATION) {
            self.exam_duration_sec = v
                .parse()
                .map_err(|_| TrainError::InvalidInput(format!("{ENV_EXAM_DURATION}={v}")))?;
        }
        if let Some(v) = lookup(ENV_VERIFY_URL) {
            self.verification_base_url = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.pass_pct) {
            return Err(TrainError::InvalidInput(format!(
                "pass_pct must be 1-100, got {}",
                self.pass_pct
            )));
        }
        if self.verification_code_len < MIN_CODE_LEN {
            return Err(TrainError::InvalidInput(format!(
                "verification_code_len must be at least {MIN_CODE_LEN}"
            )));
        }
        if self.recert_years == 0 {
            return Err(TrainError::InvalidInput("recert_years must be > 0".into()));
        }
        if self.exam_duration_sec == 0 {
            return Err(TrainError::InvalidInput(
                "exam_duration_sec must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Public verification link for a code.
    pub fn verification_url(&self, code: &str) -> String {
        format!("{}{}", self.verification_base_url, code)
    }
}

/// Resolve the data directory: explicit flag, then `TRAINCERT_HOME`, then
/// `~/.traincert`.
pub fn data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(ENV_HOME) {
        return Ok(PathBuf::from(p));
    }
    let home = std::env::var("HOME")
        .map_err(|_| TrainError::InvalidInput("HOME not set; pass --data-dir".into()))?;
    Ok(PathBuf::from(home).join(".traincert"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let c = EngineConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.pass_pct, 80);
        assert_eq!(c.recert_years, 3);
    }

    #[test]
    fn test_file_values_then_env_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"pass_pct": 70, "issuer_name": "Acme Safety"}"#,
        )
        .unwrap();
        let mut c: EngineConfig =
            serde_json::from_slice(&std::fs::read(dir.path().join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(c.pass_pct, 70);
        assert_eq!(c.exam_duration_sec, 3600);
        assert_eq!(c.issuer_name, "Acme Safety");

        c.apply_env(|k| (k == ENV_PASS_PCT).then(|| "90".to_string()))
            .unwrap();
        assert_eq!(c.pass_pct, 90);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut c = EngineConfig::default();
        let err = c
            .apply_env(|k| (k == ENV_EXAM_DURATION).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_rejects_short_codes_and_bad_pct() {
        let mut c = EngineConfig::default();
        c.verification_code_len = 8;
        assert!(c.validate().is_err());
        let mut c = EngineConfig::default();
        c.pass_pct = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_verification_url() {
        let c = EngineConfig::default();
        assert_eq!(
            c.verification_url("ABC123DEF456GHI7"),
            "https://verify.example.org/c/ABC123DEF456GHI7"
        );
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let p = Path::new("/tmp/tc");
        assert_eq!(data_dir(Some(p)).unwrap(), PathBuf::from("/tmp/tc"));
    }
}
