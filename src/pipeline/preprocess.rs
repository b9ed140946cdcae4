//! Preprocessing stage: classification, stamp and signature checks.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Processor;
use super::service::{DocumentServiceClient, ServiceEndpoints};
use crate::domain::{ActionResult, ClaimState, DocumentRef, DocumentStage, StageData};
use crate::error::Result;

/// Runs the document-level checks that must pass before text extraction:
/// document classification, stamp detection, signature verification, and a
/// captioning pass over image uploads.
///
/// No new files are produced; each raw document that clears the checks gets a
/// `preprocessed` stage reference so the extract stage knows what to work on.
pub struct PreprocessProcessor {
    service: Arc<DocumentServiceClient>,
    endpoints: ServiceEndpoints,
}

impl PreprocessProcessor {
    pub fn new(service: Arc<DocumentServiceClient>, endpoints: ServiceEndpoints) -> Self {
        Self { service, endpoints }
    }
}

#[async_trait]
impl Processor for PreprocessProcessor {
    async fn execute(&self, state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        let paths: Vec<PathBuf> = state
            .documents_at(DocumentStage::Raw)
            .iter()
            .map(|doc| doc.path.clone())
            .collect();

        if paths.is_empty() {
            return Ok(ActionResult::fail("no documents to preprocess"));
        }

        let (classifications, stamp_checks, signature_checks) = futures::try_join!(
            self.service.post_files(&self.endpoints.classify, &paths, &[]),
            self.service.post_files(&self.endpoints.stamp, &paths, &[]),
            self.service.post_files(&self.endpoints.signature, &paths, &[]),
        )?;

        let images = image_paths(&paths);
        let image_descriptions = if images.is_empty() {
            Vec::new()
        } else {
            self.service
                .post_files(&self.endpoints.describe_image, &images, &[])
                .await?
        };

        let cleared: Vec<DocumentRef> = paths
            .iter()
            .map(|path| DocumentRef::derived(path.clone(), DocumentStage::Preprocessed))
            .collect();

        let mut payload = StageData::default().with_documents(cleared).into_value()?;
        payload["classifications"] = Value::Array(classifications);
        payload["stamp_checks"] = Value::Array(stamp_checks);
        payload["signature_checks"] = Value::Array(signature_checks);
        payload["image_descriptions"] = Value::Array(image_descriptions);

        Ok(ActionResult::ok(payload))
    }
}

/// Image uploads get the extra captioning pass.
fn image_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        })
        .cloned()
        .collect()
}
