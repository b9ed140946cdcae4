//! One loop cycle's input, output, and audit record

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::action::Action;
use crate::id::now_ms;

/// How much of a payload the audit trail keeps, in characters
const OBSERVATION_MAX: usize = 500;

/// What the reasoner proposes for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form rationale, kept verbatim for the audit trail
    pub thought: String,
    pub action: Action,
    /// Opaque payload passed through to the processor
    pub action_input: Value,
}

impl Decision {
    pub fn new(action: Action, thought: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action,
            action_input: Value::Object(Default::default()),
        }
    }

    pub fn with_input(mut self, action_input: Value) -> Self {
        self.action_input = action_input;
        self
    }
}

/// What a processor hands back from one Act step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// One entry of the append-only audit trail, written once per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub thought: String,
    /// None when the reasoner's output never yielded a usable action
    pub action: Option<Action>,
    pub action_input: Value,
    /// Truncated rendering of the result or the error that ended the cycle
    pub observation: String,
    pub success: bool,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl StepRecord {
    pub fn new(
        thought: impl Into<String>,
        action: Option<Action>,
        action_input: Value,
        observation: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            thought: thought.into(),
            action,
            action_input,
            observation: observation.into(),
            success,
            created_at: now_ms(),
        }
    }

    /// Record a dispatched action together with its result
    pub fn observed(decision: &Decision, result: &ActionResult) -> Self {
        let observation = match (&result.success, &result.error) {
            (true, _) => render_payload(&result.data),
            (false, Some(err)) => err.clone(),
            (false, None) => "processor reported failure without detail".to_string(),
        };
        Self::new(
            decision.thought.clone(),
            Some(decision.action),
            decision.action_input.clone(),
            observation,
            result.success,
        )
    }

    /// Record the reserved completion marker, which dispatches nothing
    pub fn finished(decision: &Decision) -> Self {
        Self::new(
            decision.thought.clone(),
            Some(decision.action),
            decision.action_input.clone(),
            "completion acknowledged",
            true,
        )
    }

    /// Record a decision the loop refused to act on
    pub fn rejected(decision: &Decision, error: impl Into<String>) -> Self {
        Self::new(
            decision.thought.clone(),
            Some(decision.action),
            decision.action_input.clone(),
            error,
            false,
        )
    }

    /// Record a cycle where no usable decision was produced
    pub fn undecided(error: impl Into<String>) -> Self {
        Self::new("", None, Value::Null, error, false)
    }
}

/// Compact rendering of a result payload for the audit trail
fn render_payload(data: &Value) -> String {
    let rendered = match data {
        Value::Null => "ok".to_string(),
        other => other.to_string(),
    };
    truncate(&rendered, OBSERVATION_MAX)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
