//! Core reasoner trait and boundary types

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{Action, ClaimState, ClaimStatus, Decision, StepRecord, VerdictOutcome};
use crate::error::{ClaimflowError, Result};

/// The oracle that chooses each cycle's action.
///
/// Implementations never see the mutable `ClaimState`; they get a summary
/// and the audit trail, and answer with a `Decision`. Retry policy for
/// transient oracle failures lives behind this trait, not in the loop.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn decide(&self, summary: &ClaimSummary, history: &[StepRecord]) -> Result<Decision>;
}

/// Read-only view of a claim handed across the reasoner boundary
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub status: ClaimStatus,
    /// Uploaded file paths, as the reasoner should refer to them
    pub files: Vec<String>,
    /// Names of the claim fields extracted so far
    pub field_names: Vec<String>,
    /// Adjudication outcome, once the decide stage has run
    pub verdict: Option<VerdictOutcome>,
    pub iteration: u32,
    /// Observation from the previous cycle, if one has run
    pub last_observation: Option<String>,
}

impl ClaimSummary {
    pub fn of(state: &ClaimState) -> Self {
        Self {
            claim_id: state.claim_id.clone(),
            status: state.status,
            files: state
                .documents
                .iter()
                .map(|d| d.path.display().to_string())
                .collect(),
            field_names: state.extracted_fields.keys().cloned().collect(),
            verdict: state.verdict.as_ref().map(|v| v.outcome),
            iteration: state.iteration_count,
            last_observation: state.last_step().map(|s| s.observation.clone()),
        }
    }
}

/// Deterministic reasoner that replays a fixed script of decisions.
///
/// Used for tests and offline runs. When the script runs out it either
/// repeats the final decision or reports the oracle as exhausted,
/// depending on how it was built.
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Decision>>,
    repeat_last: Option<Decision>,
    calls: AtomicU32,
}

impl ScriptedReasoner {
    /// Replay the given decisions once, then fail as exhausted
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            script: Mutex::new(decisions.into()),
            repeat_last: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Propose the same decision on every call, forever
    pub fn repeating(decision: Decision) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat_last: Some(decision),
            calls: AtomicU32::new(0),
        }
    }

    /// The full pipeline in stage order, ingest through finish
    pub fn in_order() -> Self {
        let script = [
            (Action::Ingest, "validate the uploaded files"),
            (Action::Preprocess, "split and OCR the documents"),
            (Action::Extract, "pull entities out of the text"),
            (Action::Analyze, "structure the entities into claim fields"),
            (Action::Decide, "adjudicate the claim"),
            (Action::Output, "write reports and persist the record"),
            (Action::Finish, "processing is complete"),
        ]
        .into_iter()
        .map(|(action, thought)| Decision::new(action, thought))
        .collect();
        Self::new(script)
    }

    /// How many times the loop has consulted this reasoner
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(&self, _summary: &ClaimSummary, _history: &[StepRecord]) -> Result<Decision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self
            .script
            .lock()
            .map_err(|_| ClaimflowError::Reasoning("script lock poisoned".to_string()))?;
        match script.pop_front() {
            Some(decision) => Ok(decision),
            None => match &self.repeat_last {
                Some(decision) => Ok(decision.clone()),
                None => Err(ClaimflowError::Reasoning(
                    "scripted reasoner exhausted".to_string(),
                )),
            },
        }
    }
}

impl std::fmt::Debug for ScriptedReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedReasoner")
            .field("calls", &self.calls())
            .finish()
    }
}
