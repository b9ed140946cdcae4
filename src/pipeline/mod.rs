//! Claim processing pipeline
//!
//! Each stage of the pipeline is a [`Processor`]: an adapter that wraps one
//! document-processing capability (local hashing, a remote extraction service,
//! the adjudication model) behind a uniform async interface. Processors are
//! looked up by [`Action`](crate::domain::Action) through the
//! [`ActionRegistry`] and invoked by the runner during the Act phase.
//!
//! Processors never mutate claim state. They read what they need from the
//! current [`ClaimState`] and return an [`ActionResult`] whose payload the
//! Observe phase folds back into the state.

pub mod analyze;
pub mod decide;
pub mod extract;
pub mod ingest;
pub mod output;
pub mod preprocess;
pub mod registry;
pub mod service;

pub use analyze::{AnalyzeProcessor, Entity, structure_fields};
pub use decide::{CORE_FIELDS, DecideProcessor, parse_verdict};
pub use extract::{ExtractOptions, ExtractProcessor};
pub use ingest::IngestProcessor;
pub use output::OutputProcessor;
pub use preprocess::PreprocessProcessor;
pub use registry::{ActionRegistry, FinishMarker};
pub use service::{DEFAULT_SERVICE_TIMEOUT, DocumentServiceClient, ServiceEndpoints};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ActionResult, ClaimState};
use crate::error::Result;

/// A single claim-processing capability.
///
/// Failure reporting has two levels: a capability that ran and did not
/// succeed (missing file, service rejected the document) returns
/// `Ok(ActionResult::fail(..))`, and transport errors may simply propagate
/// as `Err` for the runner to fold into a failed observation the same way.
/// Both fail the claim with the failure recorded in the audit trail. A
/// success payload whose claim data does not deserialize is a contract
/// breach and surfaces as a processor error instead.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Input fields the processor requires in the decision's `action_input`.
    ///
    /// Validated by the registry before dispatch; a decision missing one of
    /// these never reaches `execute`.
    fn required_input(&self) -> &'static [&'static str] {
        &[]
    }

    /// Run the capability against the current claim.
    async fn execute(&self, state: &ClaimState, input: &Value) -> Result<ActionResult>;
}
