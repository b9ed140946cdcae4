//! Decision stage: adjudicate the claim from its structured fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Processor;
use crate::domain::{ActionResult, ClaimState, FieldValue, StageData, Verdict, VerdictOutcome};
use crate::error::Result;
use crate::reasoner::OpenAiChat;

/// Fields a decidable claim is expected to carry. The verdict's score is the
/// fraction of these present at decide time.
pub const CORE_FIELDS: [&str; 6] = [
    "patient_name",
    "provider_name",
    "policy_number",
    "diagnosis",
    "amount_total",
    "claim_date",
];

const ADJUDICATION_PROMPT: &str = r#"You are a senior health insurance claim adjudicator. Review the claim data and decide whether to approve the claim, reject it, or query the claimant for more information.

Respond with the decision word (approve, reject, or query) on the first line, then "Reasons:" followed by a short justification."#;

/// Sends the structured claim to the adjudication model and records the
/// verdict. Shares the chat client with the reasoning oracle, so both run
/// against the same endpoint and model.
pub struct DecideProcessor {
    chat: Arc<OpenAiChat>,
}

impl DecideProcessor {
    pub fn new(chat: Arc<OpenAiChat>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Processor for DecideProcessor {
    async fn execute(&self, state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        let prompt = render_adjudication_prompt(state);
        let reply = self.chat.complete("", &prompt).await?;

        let (outcome, rationale) = parse_verdict(&reply);
        let verdict = Verdict {
            outcome,
            rationale,
            score: completeness(&state.extracted_fields),
        };

        let payload = StageData::default().with_verdict(verdict).into_value()?;
        Ok(ActionResult::ok(payload))
    }
}

fn render_adjudication_prompt(state: &ClaimState) -> String {
    let mut prompt = String::from(ADJUDICATION_PROMPT);
    prompt.push_str("\n\nClaim data:\n");

    if state.extracted_fields.is_empty() {
        prompt.push_str("(no fields extracted)\n");
    } else {
        for (name, value) in &state.extracted_fields {
            prompt.push_str(&format!("- {name}: {value}\n"));
        }
    }

    prompt
}

/// Read the model's free-text reply into an outcome and rationale.
///
/// The first recognized decision word wins, checked in approve, reject,
/// query order; a reply naming none of them is treated as a query so an
/// unclear adjudication never auto-approves. The rationale is whatever
/// follows "Reasons:", or the whole reply when that marker is absent.
pub fn parse_verdict(text: &str) -> (VerdictOutcome, String) {
    let lower = text.to_lowercase();
    let outcome = if lower.contains("approve") {
        VerdictOutcome::Approve
    } else if lower.contains("reject") {
        VerdictOutcome::Reject
    } else {
        VerdictOutcome::Query
    };

    let rationale = match text.split_once("Reasons:") {
        Some((_, reasons)) => reasons.trim().to_string(),
        None => text.trim().to_string(),
    };

    (outcome, rationale)
}

fn completeness(fields: &BTreeMap<String, FieldValue>) -> f32 {
    let present = CORE_FIELDS.iter().filter(|field| fields.contains_key(**field)).count();
    present as f32 / CORE_FIELDS.len() as f32
}
