//! Decision parsing from free-form oracle output
//!
//! Oracles are asked for a single JSON object but routinely wrap it in
//! markdown fences or surrounding prose. This module digs the object out
//! and validates it against the decision contract. Output that yields no
//! usable decision is a reasoning-contract violation, never silently
//! coerced into an action.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{Action, Decision};
use crate::error::{ClaimflowError, Result};

/// Decision as it appears on the wire, before action validation
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    thought: String,
    action: String,
    #[serde(default = "empty_object")]
    action_input: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Parse one `Decision` out of raw oracle output
pub fn parse_decision(raw: &str) -> Result<Decision> {
    let body = strip_fences(raw);
    let body = locate_object(body)?;

    let parsed: RawDecision = serde_json::from_str(body)
        .map_err(|e| ClaimflowError::Reasoning(format!("malformed decision: {e}")))?;

    let action = Action::from_str(&parsed.action)?;

    Ok(Decision {
        thought: parsed.thought,
        action,
        action_input: parsed.action_input,
    })
}

/// Drop a surrounding markdown code fence, if present
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some((_, rest)) = trimmed.split_once(fence)
            && let Some((inner, _)) = rest.split_once("```")
        {
            return inner.trim();
        }
    }
    trimmed
}

/// Narrow the text down to its outermost JSON object
fn locate_object(text: &str) -> Result<&str> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(ClaimflowError::Reasoning(
            "no JSON object in oracle reply".to_string(),
        )),
    }
}
