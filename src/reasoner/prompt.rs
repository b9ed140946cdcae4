//! Prompt rendering for LLM-backed reasoners

use crate::domain::StepRecord;
use crate::reasoner::client::ClaimSummary;

/// How many trailing audit records the prompt replays
const HISTORY_WINDOW: usize = 5;

/// Static instructions given to the oracle on every cycle
pub const SYSTEM_PROMPT: &str = r#"You are a reasoning agent processing health insurance claims.

Available Actions:
1. ingest - Validate uploaded files and fingerprint them
2. preprocess - Split documents, detect stamps/signatures, OCR and translate
3. extract - Pull entities out of the document text
4. analyze - Structure entities into typed claim fields
5. decide - Make the approve/query/reject decision
6. output - Generate reports and persist the claim record
7. finish - Complete processing and return the final result

For each step, you must respond with exactly one JSON object in this format:
{
    "thought": "Your reasoning about what to do next",
    "action": "action_name",
    "action_input": {"param": "value"}
}

Process claims sequentially: ingest -> preprocess -> extract -> analyze -> decide -> output -> finish.
Only propose finish once the output step has completed."#;

/// Render the per-cycle user message with the claim's current context
pub fn render_user_prompt(summary: &ClaimSummary, history: &[StepRecord]) -> String {
    let files = if summary.files.is_empty() {
        "(none)".to_string()
    } else {
        summary.files.join(", ")
    };

    let fields = if summary.field_names.is_empty() {
        "(none yet)".to_string()
    } else {
        summary.field_names.join(", ")
    };

    let verdict = summary
        .verdict
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| "(not decided yet)".to_string());

    let observation = summary
        .last_observation
        .as_deref()
        .unwrap_or("None yet")
        .to_string();

    let mut prompt = format!(
        "Claim: {}\nCurrent files: {}\nCurrent status: {}\nExtracted fields: {}\nVerdict: {}\nPrevious observation: {}\n",
        summary.claim_id, files, summary.status, fields, verdict, observation
    );

    if !history.is_empty() {
        prompt.push_str("\nRecent steps:\n");
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for (i, step) in history[start..].iter().enumerate() {
            let action = step
                .action
                .map(|a| a.as_str())
                .unwrap_or("(no valid action)");
            let outcome = if step.success { "ok" } else { "failed" };
            prompt.push_str(&format!("{}. {} -> {}\n", start + i + 1, action, outcome));
        }
    }

    prompt.push_str(&format!(
        "\nIteration {}. What is your next action?",
        summary.iteration
    ));
    prompt
}
