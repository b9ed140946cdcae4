//! Output stage: write adjudication reports and persist the claim record.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Processor;
use crate::domain::{ActionResult, ClaimState, StageData, Verdict};
use crate::error::Result;
use crate::store::{ClaimRecord, ClaimStore};

const REPORT_RULE: &str = "========================================";

/// Writes the machine-readable and human-readable adjudication reports and
/// saves the claim record. Running it again for the same claim overwrites
/// the report files and supersedes the stored record.
pub struct OutputProcessor {
    store: Arc<dyn ClaimStore>,
    reports_dir: PathBuf,
}

impl OutputProcessor {
    pub fn new(store: Arc<dyn ClaimStore>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            reports_dir: reports_dir.into(),
        }
    }
}

#[async_trait]
impl Processor for OutputProcessor {
    async fn execute(&self, state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        let Some(verdict) = state.verdict.clone() else {
            return Ok(ActionResult::fail("no verdict to report; decide has not run"));
        };

        tokio::fs::create_dir_all(&self.reports_dir).await?;

        let json_path = self.reports_dir.join(format!("report_{}.json", state.claim_id));
        let text_path = self.reports_dir.join(format!("report_{}.txt", state.claim_id));

        let record = ClaimRecord::of(state, verdict.clone(), vec![json_path.clone(), text_path.clone()]);

        tokio::fs::write(&json_path, serde_json::to_string_pretty(&record)?).await?;
        tokio::fs::write(&text_path, render_text_report(state, &verdict)).await?;

        self.store.save(&record)?;

        let mut payload = StageData::default().into_value()?;
        payload["json_report"] = Value::from(json_path.display().to_string());
        payload["text_report"] = Value::from(text_path.display().to_string());
        payload["stored"] = Value::from(true);

        Ok(ActionResult::ok(payload))
    }
}

fn render_text_report(state: &ClaimState, verdict: &Verdict) -> String {
    let mut report = String::new();

    report.push_str(REPORT_RULE);
    report.push_str("\nADJUDICATION REPORT\n");
    report.push_str(REPORT_RULE);
    report.push('\n');

    report.push_str(&format!("Claim ID: {}\n", state.claim_id));
    report.push_str(&format!(
        "Generated: {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    report.push('\n');

    report.push_str(&format!("Decision: {}\n", verdict.outcome.as_str().to_uppercase()));
    report.push_str(&format!("Completeness: {:.2}\n", verdict.score));
    report.push('\n');

    report.push_str("Fields:\n");
    if state.extracted_fields.is_empty() {
        report.push_str("  (none extracted)\n");
    } else {
        for (name, value) in &state.extracted_fields {
            report.push_str(&format!("  {name}: {value}\n"));
        }
    }
    report.push('\n');

    report.push_str("Documents:\n");
    for doc in &state.documents {
        match &doc.sha256 {
            Some(sha) => report.push_str(&format!("  {} (sha256 {})\n", doc.path.display(), &sha[..12.min(sha.len())])),
            None => report.push_str(&format!("  {}\n", doc.path.display())),
        }
    }
    report.push('\n');

    report.push_str("Rationale:\n");
    report.push_str(&verdict.rationale);
    report.push('\n');
    report.push_str(REPORT_RULE);
    report.push('\n');

    report
}
