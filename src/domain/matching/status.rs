//! Lifecycle status of a match session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Matched → Active → Completed. Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchSessionStatus {
    /// Paired, timer not yet running.
    #[default]
    Matched,
    /// Timer running.
    Active,
    Completed,
}

impl MatchSessionStatus {
    /// Returns true while the session still holds its participants.
    pub fn is_live(&self) -> bool {
        !matches!(self, MatchSessionStatus::Completed)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSessionStatus::Matched => "matched",
            MatchSessionStatus::Active => "active",
            MatchSessionStatus::Completed => "completed",
        }
    }
}

impl StateMachine for MatchSessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use MatchSessionStatus::*;
        matches!(
            (self, target),
            (Matched, Active) | (Matched, Completed) | (Active, Completed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use MatchSessionStatus::*;
        match self {
            Matched => vec![Active, Completed],
            Active => vec![Completed],
            Completed => vec![],
        }
    }
}

impl fmt::Display for MatchSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MatchSessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matched" => Ok(MatchSessionStatus::Matched),
            "active" => Ok(MatchSessionStatus::Active),
            "completed" => Ok(MatchSessionStatus::Completed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown session status '{}'", other),
            )),
        }
    }
}
