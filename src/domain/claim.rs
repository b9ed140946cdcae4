//! Claim state and related types
//!
//! `ClaimState` is the core abstraction in claimflow: the single mutable record
//! of a claim's processing progress, threaded through the Think → Act → Observe
//! loop. Only the loop driver mutates it; processors see a read-only view and
//! hand back data for the driver to fold in.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::payload::StageData;
use crate::domain::step::StepRecord;
use crate::id::now_ms;

/// Stage marker for a claim's progress through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Submitted, nothing run yet
    Created,
    /// Uploads validated and fingerprinted
    Ingested,
    /// Documents classified, split, and OCR'd
    Preprocessed,
    /// Entities pulled out of document text
    Extracted,
    /// Entities structured into typed claim fields
    Analyzed,
    /// Adjudication verdict produced
    Decided,
    /// Reports written and record persisted
    OutputDone,
    /// Completion acknowledged; nothing further will run
    Finished,
    /// A collaborator broke its contract or a processor failed
    Failed,
}

impl ClaimStatus {
    /// Position in the forward-only stage order. `Failed` ranks past
    /// `Finished` so nothing can advance out of it.
    pub fn rank(&self) -> u8 {
        match self {
            ClaimStatus::Created => 0,
            ClaimStatus::Ingested => 1,
            ClaimStatus::Preprocessed => 2,
            ClaimStatus::Extracted => 3,
            ClaimStatus::Analyzed => 4,
            ClaimStatus::Decided => 5,
            ClaimStatus::OutputDone => 6,
            ClaimStatus::Finished => 7,
            ClaimStatus::Failed => 8,
        }
    }

    /// Returns true if the claim is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Finished | ClaimStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Created => "created",
            ClaimStatus::Ingested => "ingested",
            ClaimStatus::Preprocessed => "preprocessed",
            ClaimStatus::Extracted => "extracted",
            ClaimStatus::Analyzed => "analyzed",
            ClaimStatus::Decided => "decided",
            ClaimStatus::OutputDone => "output_done",
            ClaimStatus::Finished => "finished",
            ClaimStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which form of a document a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStage {
    /// As uploaded
    Raw,
    /// Split, translated, or OCR'd derivative
    Preprocessed,
    /// Entity-annotated derivative
    Extracted,
}

/// A reference to one document in the claim's ordered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: PathBuf,
    pub stage: DocumentStage,
    /// Content fingerprint, set once the ingest stage has read the bytes
    pub sha256: Option<String>,
}

impl DocumentRef {
    /// Reference an uploaded file that has not been validated yet
    pub fn raw(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stage: DocumentStage::Raw,
            sha256: None,
        }
    }

    /// Reference a derivative produced by a pipeline stage
    pub fn derived(path: impl Into<PathBuf>, stage: DocumentStage) -> Self {
        Self {
            path: path.into(),
            stage,
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// A typed value extracted from claim documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldValue {
    Text { value: String },
    Date { value: NaiveDate },
    Money { minor_units: i64, currency: String },
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text {
            value: value.into(),
        }
    }

    pub fn date(value: NaiveDate) -> Self {
        FieldValue::Date { value }
    }

    pub fn money(minor_units: i64, currency: impl Into<String>) -> Self {
        FieldValue::Money {
            minor_units,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text { value } => f.write_str(value),
            FieldValue::Date { value } => write!(f, "{}", value.format("%Y-%m-%d")),
            FieldValue::Money {
                minor_units,
                currency,
            } => {
                write!(f, "{}.{:02} {}", minor_units / 100, (minor_units % 100).abs(), currency)
            }
        }
    }
}

/// The adjudication outcome for a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictOutcome {
    Approve,
    Query,
    Reject,
}

impl VerdictOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictOutcome::Approve => "approve",
            VerdictOutcome::Query => "query",
            VerdictOutcome::Reject => "reject",
        }
    }
}

impl fmt::Display for VerdictOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome record set by the decide stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: VerdictOutcome,
    pub rationale: String,
    /// Completeness of the core claim fields at decide time, 0.0 to 1.0
    pub score: f32,
}

/// The single mutable record threaded through one claim's run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimState {
    //=== Identity ===
    /// Opaque identifier assigned at submission, immutable thereafter
    pub claim_id: String,

    //=== Accumulated data ===
    /// Ordered document references, raw uploads first
    pub documents: Vec<DocumentRef>,

    /// Extracted claim fields; keys may be overwritten, never removed
    pub extracted_fields: BTreeMap<String, FieldValue>,

    /// Set only once the decide stage has run
    pub verdict: Option<Verdict>,

    //=== Runtime state ===
    /// Forward-only stage marker
    pub status: ClaimStatus,

    /// Append-only audit trail, one record per loop cycle
    pub history: Vec<StepRecord>,

    /// Number of completed loop cycles; always equals `history.len()`
    pub iteration_count: u32,

    //=== Timestamps ===
    pub created_at: i64,
    pub updated_at: i64,
}

impl ClaimState {
    /// Create a fresh claim from uploaded file references
    pub fn new(claim_id: impl Into<String>, files: Vec<PathBuf>) -> Self {
        let now = now_ms();
        Self {
            claim_id: claim_id.into(),
            documents: files.into_iter().map(DocumentRef::raw).collect(),
            extracted_fields: BTreeMap::new(),
            verdict: None,
            status: ClaimStatus::Created,
            history: Vec::new(),
            iteration_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the stage marker, never regressing it
    pub fn advance_to(&mut self, status: ClaimStatus) {
        if status.rank() > self.status.rank() {
            self.status = status;
        }
        self.touch();
    }

    /// Mark the claim failed; terminal
    pub fn fail(&mut self) {
        self.status = ClaimStatus::Failed;
        self.touch();
    }

    /// Append one cycle's audit record and bump the cycle counter.
    /// This is the only place either field changes, which keeps
    /// `history.len() == iteration_count` on every path.
    pub fn record_step(&mut self, step: StepRecord) {
        self.history.push(step);
        self.iteration_count += 1;
        self.touch();
    }

    /// Fold a successful processor payload into the accumulated data
    pub fn absorb(&mut self, data: StageData) {
        for doc in data.documents {
            match self
                .documents
                .iter_mut()
                .find(|d| d.path == doc.path && d.stage == doc.stage)
            {
                Some(existing) => *existing = doc,
                None => self.documents.push(doc),
            }
        }
        self.extracted_fields.extend(data.fields);
        if data.verdict.is_some() {
            self.verdict = data.verdict;
        }
        self.touch();
    }

    /// Documents at a given stage, in order
    pub fn documents_at(&self, stage: DocumentStage) -> Vec<&DocumentRef> {
        self.documents.iter().filter(|d| d.stage == stage).collect()
    }

    /// The most recent audit record, if any cycle has completed
    pub fn last_step(&self) -> Option<&StepRecord> {
        self.history.last()
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}
