//! Engine wiring: config in, ready-to-run claim pipeline out.
//!
//! `ClaimEngine` owns the assembled collaborators: the reasoning oracle, the
//! action registry with one processor per pipeline stage, the claim store,
//! and the loop driver. The oracle and the decide stage share one chat
//! client, so a single endpoint, model, and key serve both.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::info;

use crate::config::Config;
use crate::domain::{Action, ClaimState, RunOutcome};
use crate::error::{ClaimflowError, Result};
use crate::id::generate_claim_id;
use crate::pipeline::{
    ActionRegistry, AnalyzeProcessor, DecideProcessor, DocumentServiceClient, ExtractProcessor,
    FinishMarker, IngestProcessor, OutputProcessor, PreprocessProcessor, ServiceEndpoints,
};
use crate::reasoner::{OpenAiChat, OpenAiReasoner, Reasoner};
use crate::runner::ClaimRunner;
use crate::store::{ClaimStore, JsonlClaimStore};

/// The assembled claim-processing pipeline.
pub struct ClaimEngine {
    runner: ClaimRunner,
}

impl ClaimEngine {
    /// Assemble the production pipeline from configuration.
    ///
    /// Reads the oracle API key from the configured environment variable;
    /// everything else comes from the config object.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let api_key = std::env::var(&config.reasoner.api_key_env).map_err(|_| {
            ClaimflowError::Config(format!("{} not set", config.reasoner.api_key_env))
        })?;

        let chat = Arc::new(OpenAiChat::with_api_key(
            api_key,
            config.reasoner.oracle_config(),
        )?);
        let reasoner: Arc<dyn Reasoner> =
            Arc::new(OpenAiReasoner::from_chat(Arc::clone(&chat)));

        let service = Arc::new(DocumentServiceClient::new(config.services.timeout())?);
        let endpoints = config.services.endpoints();

        let store: Arc<dyn ClaimStore> = Arc::new(JsonlClaimStore::new(&config.output.data_dir)?);

        let registry = Arc::new(Self::build_registry(chat, service, endpoints, store, config));

        let runner = ClaimRunner::with_config(reasoner, registry, config.engine.runner_config());

        Ok(Self { runner })
    }

    /// Assemble an engine around a pre-built loop driver.
    pub fn new(runner: ClaimRunner) -> Self {
        Self { runner }
    }

    fn build_registry(
        chat: Arc<OpenAiChat>,
        service: Arc<DocumentServiceClient>,
        endpoints: ServiceEndpoints,
        store: Arc<dyn ClaimStore>,
        config: &Config,
    ) -> ActionRegistry {
        ActionRegistry::new()
            .register(Action::Ingest, Arc::new(IngestProcessor))
            .register(
                Action::Preprocess,
                Arc::new(PreprocessProcessor::new(
                    Arc::clone(&service),
                    endpoints.clone(),
                )),
            )
            .register(
                Action::Extract,
                Arc::new(ExtractProcessor::new(
                    Arc::clone(&service),
                    endpoints.clone(),
                    config.processing.extract_options(),
                )),
            )
            .register(
                Action::Analyze,
                Arc::new(AnalyzeProcessor::new(Arc::clone(&service), endpoints)),
            )
            .register(Action::Decide, Arc::new(DecideProcessor::new(chat)))
            .register(
                Action::Output,
                Arc::new(OutputProcessor::new(
                    store,
                    config.output.reports_dir.clone(),
                )),
            )
            .register(Action::Finish, Arc::new(FinishMarker))
    }

    /// Run one claim end to end.
    ///
    /// A fresh claim is created from the given files; when no id is supplied
    /// one is generated. Returns the terminal state and the run outcome.
    pub async fn process(
        &self,
        files: Vec<PathBuf>,
        claim_id: Option<String>,
    ) -> (ClaimState, RunOutcome) {
        self.process_with_cancel(files, claim_id, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Run one claim end to end, checking `cancel` between loop cycles.
    pub async fn process_with_cancel(
        &self,
        files: Vec<PathBuf>,
        claim_id: Option<String>,
        cancel: Arc<AtomicBool>,
    ) -> (ClaimState, RunOutcome) {
        let claim_id = claim_id.unwrap_or_else(generate_claim_id);
        info!(claim_id = %claim_id, files = files.len(), "processing claim");

        let mut state = ClaimState::new(claim_id, files);
        let outcome = self.runner.run_with_cancel(&mut state, cancel).await;

        (state, outcome)
    }
}
