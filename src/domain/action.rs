//! The seven recognized pipeline actions
//!
//! An `Action` is what the reasoner proposes each cycle. Six of them map onto
//! real processors; `finish` is reserved and performs no external call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::claim::ClaimStatus;
use crate::error::ClaimflowError;

/// One step of the claim pipeline, as named by the reasoner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Ingest,
    Preprocess,
    Extract,
    Analyze,
    Decide,
    Output,
    Finish,
}

/// All actions, in pipeline order
pub const ALL_ACTIONS: [Action; 7] = [
    Action::Ingest,
    Action::Preprocess,
    Action::Extract,
    Action::Analyze,
    Action::Decide,
    Action::Output,
    Action::Finish,
];

impl Action {
    /// The wire name the reasoner uses for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ingest => "ingest",
            Action::Preprocess => "preprocess",
            Action::Extract => "extract",
            Action::Analyze => "analyze",
            Action::Decide => "decide",
            Action::Output => "output",
            Action::Finish => "finish",
        }
    }

    /// The stage a claim must have reached before this action is in order
    pub fn prerequisite(&self) -> ClaimStatus {
        match self {
            Action::Ingest => ClaimStatus::Created,
            Action::Preprocess => ClaimStatus::Ingested,
            Action::Extract => ClaimStatus::Preprocessed,
            Action::Analyze => ClaimStatus::Extracted,
            Action::Decide => ClaimStatus::Analyzed,
            Action::Output => ClaimStatus::Decided,
            Action::Finish => ClaimStatus::OutputDone,
        }
    }

    /// The stage a claim has reached once this action succeeds
    pub fn completed_status(&self) -> ClaimStatus {
        match self {
            Action::Ingest => ClaimStatus::Ingested,
            Action::Preprocess => ClaimStatus::Preprocessed,
            Action::Extract => ClaimStatus::Extracted,
            Action::Analyze => ClaimStatus::Analyzed,
            Action::Decide => ClaimStatus::Decided,
            Action::Output => ClaimStatus::OutputDone,
            Action::Finish => ClaimStatus::Finished,
        }
    }

    /// True for the reserved completion marker
    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish)
    }

    /// True when the claim has progressed far enough for this action
    pub fn in_order_at(&self, status: ClaimStatus) -> bool {
        status.rank() >= self.prerequisite().rank()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ClaimflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingest" => Ok(Action::Ingest),
            "preprocess" => Ok(Action::Preprocess),
            "extract" => Ok(Action::Extract),
            "analyze" => Ok(Action::Analyze),
            "decide" => Ok(Action::Decide),
            "output" => Ok(Action::Output),
            "finish" => Ok(Action::Finish),
            other => Err(ClaimflowError::UnknownAction(other.to_string())),
        }
    }
}
