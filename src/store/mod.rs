//! Durable storage for adjudicated claims
//!
//! The output stage writes one [`ClaimRecord`] per adjudicated claim; the
//! CLI reads them back for history queries. Storage sits behind the
//! [`ClaimStore`] trait so runs use the JSONL store and tests use an
//! in-memory one.

pub mod jsonl;

pub use jsonl::JsonlClaimStore;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::domain::{ClaimState, DocumentRef, FieldValue, Verdict};
use crate::error::{ClaimflowError, Result};
use crate::id::now_ms;

/// What the output stage persists for an adjudicated claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_id: String,
    pub verdict: Verdict,
    pub fields: BTreeMap<String, FieldValue>,
    pub documents: Vec<DocumentRef>,
    /// Report files written alongside this record
    pub reports: Vec<PathBuf>,
    /// Loop cycles the claim took to reach its verdict
    pub iterations: u32,
    pub recorded_at: i64,
}

impl ClaimRecord {
    pub fn of(state: &ClaimState, verdict: Verdict, reports: Vec<PathBuf>) -> Self {
        Self {
            claim_id: state.claim_id.clone(),
            verdict,
            fields: state.extracted_fields.clone(),
            documents: state.documents.clone(),
            reports,
            iterations: state.iteration_count,
            recorded_at: now_ms(),
        }
    }
}

/// Persistence boundary for adjudicated claims.
pub trait ClaimStore: Send + Sync {
    /// Persist a record; saving the same claim again replaces it.
    fn save(&self, record: &ClaimRecord) -> Result<()>;

    fn load(&self, claim_id: &str) -> Result<Option<ClaimRecord>>;

    /// All records, oldest first.
    fn list(&self) -> Result<Vec<ClaimRecord>>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryClaimStore {
    records: RwLock<HashMap<String, ClaimRecord>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimStore for InMemoryClaimStore {
    fn save(&self, record: &ClaimRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        records.insert(record.claim_id.clone(), record.clone());
        Ok(())
    }

    fn load(&self, claim_id: &str) -> Result<Option<ClaimRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        Ok(records.get(claim_id).cloned())
    }

    fn list(&self) -> Result<Vec<ClaimRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        let mut all: Vec<ClaimRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.claim_id.cmp(&b.claim_id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VerdictOutcome;

    fn record(claim_id: &str) -> ClaimRecord {
        let state = ClaimState::new(claim_id, vec![PathBuf::from("scan.pdf")]);
        ClaimRecord::of(
            &state,
            Verdict {
                outcome: VerdictOutcome::Approve,
                rationale: "complete".to_string(),
                score: 1.0,
            },
            vec![PathBuf::from("report.json")],
        )
    }

    #[test]
    fn test_record_of_captures_state() {
        let mut state = ClaimState::new("clm-r", vec![PathBuf::from("scan.pdf")]);
        state
            .extracted_fields
            .insert("patient_name".to_string(), FieldValue::text("Jane"));
        state.iteration_count = 7;

        let rec = ClaimRecord::of(
            &state,
            Verdict {
                outcome: VerdictOutcome::Query,
                rationale: "missing policy".to_string(),
                score: 0.5,
            },
            vec![],
        );

        assert_eq!(rec.claim_id, "clm-r");
        assert_eq!(rec.iterations, 7);
        assert_eq!(rec.fields.len(), 1);
        assert_eq!(rec.verdict.outcome, VerdictOutcome::Query);
    }

    #[test]
    fn test_in_memory_save_and_load() {
        let store = InMemoryClaimStore::new();
        store.save(&record("clm-1")).unwrap();

        let loaded = store.load("clm-1").unwrap().unwrap();
        assert_eq!(loaded.claim_id, "clm-1");
        assert!(store.load("clm-2").unwrap().is_none());
    }

    #[test]
    fn test_in_memory_save_replaces() {
        let store = InMemoryClaimStore::new();
        let mut rec = record("clm-1");
        store.save(&rec).unwrap();

        rec.verdict.outcome = VerdictOutcome::Reject;
        store.save(&rec).unwrap();

        let loaded = store.load("clm-1").unwrap().unwrap();
        assert_eq!(loaded.verdict.outcome, VerdictOutcome::Reject);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_in_memory_list_ordered() {
        let store = InMemoryClaimStore::new();
        let mut first = record("clm-b");
        first.recorded_at = 100;
        let mut second = record("clm-a");
        second.recorded_at = 200;
        store.save(&second).unwrap();
        store.save(&first).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all[0].claim_id, "clm-b");
        assert_eq!(all[1].claim_id, "clm-a");
    }
}
