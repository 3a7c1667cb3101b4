//! Caller identity and role checks.
//!
//! Authentication happens upstream; the engine receives an [`Actor`] and
//! decides what it may do.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Role attached to a caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Learner,
    Staff,
    Evaluator,
    Trainer,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Staff => "staff",
            Role::Evaluator => "evaluator",
            Role::Trainer => "trainer",
            Role::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "learner" => Ok(Role::Learner),
            "staff" | "admin" => Ok(Role::Staff),
            "evaluator" => Ok(Role::Evaluator),
            "trainer" => Ok(Role::Trainer),
            "system" => Ok(Role::System),
            other => Err(TrainError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn learner(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Learner)
    }

    pub fn staff(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Staff)
    }

    pub fn system() -> Self {
        Self::new("system", Role::System)
    }

    /// Require one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(TrainError::Forbidden(format!(
                "role '{}' may not perform this operation",
                self.role.as_str()
            )))
        }
    }

    /// Require that the actor is the learner who owns a record, or staff.
    pub fn require_owner(&self, learner_id: &str) -> Result<()> {
        if self.user_id == learner_id || matches!(self.role, Role::Staff | Role::System) {
            Ok(())
        } else {
            Err(TrainError::Forbidden(
                "record belongs to another learner".into(),
            ))
        }
    }
}

/// Turn an optional caller into an actor, failing with `Unauthorized`.
pub fn authenticated(actor: Option<&Actor>) -> Result<&Actor> {
    match actor {
        Some(a) if !a.user_id.trim().is_empty() => Ok(a),
        _ => Err(TrainError::Unauthorized),
    }
}
