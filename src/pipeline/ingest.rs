//! Ingestion stage: validate and fingerprint the uploaded documents.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::Processor;
use crate::domain::{ActionResult, ClaimState, DocumentRef, DocumentStage, StageData};
use crate::error::Result;

/// Validates that every submitted document is readable and records a sha256
/// fingerprint for each, so later stages and the final report can state
/// exactly which bytes were processed.
///
/// This is the only stage with no remote dependency.
pub struct IngestProcessor;

#[async_trait]
impl Processor for IngestProcessor {
    async fn execute(&self, state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        let raw: Vec<DocumentRef> = state
            .documents_at(DocumentStage::Raw)
            .into_iter()
            .cloned()
            .collect();

        if raw.is_empty() {
            return Ok(ActionResult::fail("no documents to ingest"));
        }

        let mut validated = Vec::with_capacity(raw.len());
        for doc in raw {
            let bytes = match tokio::fs::read(&doc.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return Ok(ActionResult::fail(format!(
                        "cannot read {}: {e}",
                        doc.path.display()
                    )));
                }
            };

            let digest = Sha256::digest(&bytes);
            validated.push(DocumentRef::raw(doc.path).with_sha256(hex::encode(digest)));
        }

        let count = validated.len();
        let mut payload = StageData::default().with_documents(validated).into_value()?;
        payload["validated"] = Value::from(count);

        Ok(ActionResult::ok(payload))
    }
}
