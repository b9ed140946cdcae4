//! Extraction stage: OCR text, tables, and optional translation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Processor;
use super::service::{DocumentServiceClient, ServiceEndpoints};
use crate::domain::{ActionResult, ClaimState, DocumentRef, DocumentStage, StageData};
use crate::error::Result;

/// Page window and work-area settings for the extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory where per-claim text derivatives are written
    pub work_dir: PathBuf,
    /// Translation target when the decision asks for `"translate": true`
    pub default_language: String,
    pub start_page: u32,
    pub end_page: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(".claimflow/work"),
            default_language: "en".to_string(),
            start_page: 1,
            end_page: 10,
        }
    }
}

/// Pulls text and tables out of the preprocessed documents.
///
/// OCR output is written to `{work_dir}/{claim_id}/` as one text file per
/// document and referenced at the `extracted` stage, so the analyze stage
/// reads text from disk instead of carrying blobs through claim state.
pub struct ExtractProcessor {
    service: Arc<DocumentServiceClient>,
    endpoints: ServiceEndpoints,
    options: ExtractOptions,
}

impl ExtractProcessor {
    pub fn new(service: Arc<DocumentServiceClient>, endpoints: ServiceEndpoints, options: ExtractOptions) -> Self {
        Self {
            service,
            endpoints,
            options,
        }
    }

    /// Translation target for this run, if the decision asked for one.
    fn translation_target(&self, input: &Value) -> Option<String> {
        if let Some(target) = input.get("translate_to").and_then(Value::as_str) {
            return Some(target.to_string());
        }
        if input.get("translate").and_then(Value::as_bool) == Some(true) {
            return Some(self.options.default_language.clone());
        }
        None
    }
}

#[async_trait]
impl Processor for ExtractProcessor {
    async fn execute(&self, state: &ClaimState, input: &Value) -> Result<ActionResult> {
        let paths: Vec<PathBuf> = state
            .documents_at(DocumentStage::Preprocessed)
            .iter()
            .map(|doc| doc.path.clone())
            .collect();

        if paths.is_empty() {
            return Ok(ActionResult::fail("no preprocessed documents to extract from"));
        }

        let pages = [
            ("start_page", self.options.start_page.to_string()),
            ("end_page", self.options.end_page.to_string()),
        ];

        let (text_replies, table_replies) = futures::try_join!(
            self.service.post_files(&self.endpoints.extract_text, &paths, &pages),
            self.service.post_files(&self.endpoints.extract_tables, &paths, &[]),
        )?;

        let mut texts: Vec<(PathBuf, String)> = Vec::new();
        for (path, reply) in paths.iter().zip(&text_replies) {
            if let Some(text) = text_of(reply) {
                texts.push((path.clone(), text));
            }
        }

        if texts.is_empty() {
            return Ok(ActionResult::fail("no text extracted from any document"));
        }

        let target = self.translation_target(input);
        if let Some(target) = &target {
            let originals: Vec<String> = texts.iter().map(|(_, text)| text.clone()).collect();
            let fields = [("target_language", target.clone())];
            let replies = self
                .service
                .post_texts(&self.endpoints.translate, &originals, &fields)
                .await?;
            for ((_, text), reply) in texts.iter_mut().zip(&replies) {
                if let Some(translated) = translated_of(reply) {
                    *text = translated;
                }
            }
        }

        let claim_dir = self.options.work_dir.join(&state.claim_id);
        tokio::fs::create_dir_all(&claim_dir).await?;

        let mut extracted = Vec::with_capacity(texts.len());
        for (index, (source, text)) in texts.iter().enumerate() {
            let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
            let path = claim_dir.join(format!("{stem}_{index}.txt"));
            tokio::fs::write(&path, text).await?;
            extracted.push(DocumentRef::derived(path, DocumentStage::Extracted));
        }

        let count = extracted.len();
        let mut payload = StageData::default().with_documents(extracted).into_value()?;
        payload["texts_extracted"] = Value::from(count);
        payload["tables"] = Value::Array(table_replies);
        payload["translated_to"] = target.map(Value::from).unwrap_or(Value::Null);

        Ok(ActionResult::ok(payload))
    }
}

/// OCR services reply with `extracted_text`; older ones use plain `text`.
fn text_of(reply: &Value) -> Option<String> {
    reply
        .get("extracted_text")
        .or_else(|| reply.get("text"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

fn translated_of(reply: &Value) -> Option<String> {
    reply
        .get("translated_text")
        .or_else(|| reply.get("text"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}
