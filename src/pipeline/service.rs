//! HTTP client for the document-processing capability services.
//!
//! Every capability (OCR, NER, classification, stamp and signature detection,
//! translation, summarization) is a separate HTTP endpoint that accepts
//! multipart form uploads and returns JSON. This client owns the wire
//! contract: files go up as a `file` part plus a `filename` text field,
//! text goes up as a `text` field, and any extra parameters ride along as
//! string form fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClaimflowError, Result};

/// Default per-request timeout for capability calls.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_SERVICE_BASE: &str = "http://localhost:8090";

/// URLs for the nine document-processing capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub classify: String,
    pub stamp: String,
    pub signature: String,
    pub describe_image: String,
    pub extract_text: String,
    pub extract_tables: String,
    pub translate: String,
    pub ner: String,
    pub summarize: String,
}

impl ServiceEndpoints {
    /// Build the full endpoint set from a single service base URL.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            classify: format!("{base}/classify"),
            stamp: format!("{base}/stamp"),
            signature: format!("{base}/signature"),
            describe_image: format!("{base}/describe-image"),
            extract_text: format!("{base}/extract-text"),
            extract_tables: format!("{base}/extract-tables"),
            translate: format!("{base}/translate"),
            ner: format!("{base}/ner"),
            summarize: format!("{base}/summarize"),
        }
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self::with_base(DEFAULT_SERVICE_BASE)
    }
}

/// Client for the capability services.
pub struct DocumentServiceClient {
    client: reqwest::Client,
}

impl DocumentServiceClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaimflowError::Config(format!("failed to build service client: {e}")))?;

        Ok(Self { client })
    }

    /// Upload a file to a capability endpoint.
    ///
    /// The file rides as a multipart `file` part; the bare name is repeated
    /// as a `filename` text field because several services key their response
    /// on it. Extra fields are sent as string form values.
    pub async fn post_file(&self, url: &str, path: &Path, fields: &[(&'static str, String)]) -> Result<Value> {
        let bytes = tokio::fs::read(path).await?;
        let name = file_name_of(path);

        let part = multipart::Part::bytes(bytes).file_name(name.clone());
        let mut form = multipart::Form::new().part("file", part).text("filename", name);
        for (key, value) in fields {
            form = form.text(*key, value.clone());
        }

        let response = self.client.post(url).multipart(form).send().await?;
        Self::read_json(response).await
    }

    /// Send text to a capability endpoint as a `text` form field.
    pub async fn post_text(&self, url: &str, text: &str, fields: &[(&'static str, String)]) -> Result<Value> {
        let mut form = multipart::Form::new().text("text", text.to_string());
        for (key, value) in fields {
            form = form.text(*key, value.clone());
        }

        let response = self.client.post(url).multipart(form).send().await?;
        Self::read_json(response).await
    }

    /// Upload several files to the same endpoint concurrently.
    pub async fn post_files(&self, url: &str, paths: &[PathBuf], fields: &[(&'static str, String)]) -> Result<Vec<Value>> {
        try_join_all(paths.iter().map(|path| self.post_file(url, path, fields))).await
    }

    /// Send several texts to the same endpoint concurrently.
    pub async fn post_texts(&self, url: &str, texts: &[String], fields: &[(&'static str, String)]) -> Result<Vec<Value>> {
        try_join_all(texts.iter().map(|text| self.post_text(url, text, fields))).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClaimflowError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for DocumentServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentServiceClient").finish_non_exhaustive()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
