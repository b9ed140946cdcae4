//! Error types for claimflow
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while running a claim
#[derive(Debug, Error)]
pub enum ClaimflowError {
    /// Reasoner produced output that is not a usable decision:
    /// unparseable JSON, missing fields, or a malformed action input
    #[error("Reasoning error: {0}")]
    Reasoning(String),

    /// Decision proposed an action whose prerequisite stage has not
    /// been reached yet
    #[error("Sequence error: {action} requires {required}, claim is at {actual}")]
    Sequence {
        action: String,
        required: String,
        actual: String,
    },

    /// Decision named an action that is not in the registry
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Reasoner proposed finish before the output stage completed
    #[error("Premature finish: claim is at {0}, output has not completed")]
    PrematureFinish(String),

    /// Processor broke its contract (bad payload shape, internal fault)
    #[error("Processor error in {action}: {message}")]
    Processor { action: String, message: String },

    /// Claim not found in storage
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error talking to a capability service or the reasoner
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service replied with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClaimflowError {
    /// True for breaches of the reasoning contract: the oracle emitted
    /// something the control loop refuses to act on. These terminate the
    /// run as failed rather than being folded into an observation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ClaimflowError::Reasoning(_)
                | ClaimflowError::Sequence { .. }
                | ClaimflowError::UnknownAction(_)
                | ClaimflowError::PrematureFinish(_)
        )
    }
}

/// Result type alias for claimflow operations
pub type Result<T> = std::result::Result<T, ClaimflowError>;
