//! Run outcome types.
//!
//! This module defines how a claim run over one `ClaimState` ended.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one claim run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Reasoner acknowledged completion after the output stage
    Completed,
    /// A processor failed or a collaborator broke its contract
    Failed(String),
    /// Safety bound reached before completion; runaway reasoning, not a crash
    IterationLimitExceeded,
    /// Caller withdrew the run between cycles
    Cancelled,
}

impl RunOutcome {
    /// True only for the happy path
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            RunOutcome::IterationLimitExceeded => f.write_str("iteration limit exceeded"),
            RunOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}
