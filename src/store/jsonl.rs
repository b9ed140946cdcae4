//! JSONL-backed claim store with in-memory caching.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::{ClaimRecord, ClaimStore};
use crate::error::{ClaimflowError, Result};

const CLAIMS_FILE: &str = "claims.jsonl";

/// Append-only JSONL store.
///
/// The file is the source of truth: saves append a line before touching the
/// cache, and the cache is loaded lazily from disk with the last line per
/// claim winning. Re-adjudicating a claim therefore appends a superseding
/// record instead of rewriting history.
pub struct JsonlClaimStore {
    path: PathBuf,
    cache: RwLock<Option<HashMap<String, ClaimRecord>>>,
}

impl JsonlClaimStore {
    /// Create a store rooted at the given directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;

        Ok(Self {
            path: base_dir.join(CLAIMS_FILE),
            cache: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_loaded(&self) -> Result<()> {
        {
            let cache = self.cache.read().map_err(|e| ClaimflowError::Storage(e.to_string()))?;
            if cache.is_some() {
                return Ok(());
            }
        }

        let mut cache = self.cache.write().map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        if cache.is_some() {
            return Ok(());
        }

        let mut records = HashMap::new();
        if self.path.exists() {
            let file = File::open(&self.path)?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ClaimRecord = serde_json::from_str(&line)?;
                records.insert(record.claim_id.clone(), record);
            }
        }

        *cache = Some(records);
        Ok(())
    }

    fn append_to_file(&self, record: &ClaimRecord) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }
}

impl ClaimStore for JsonlClaimStore {
    fn save(&self, record: &ClaimRecord) -> Result<()> {
        self.ensure_loaded()?;

        // Append to file first (source of truth)
        self.append_to_file(record)?;

        let mut cache = self.cache.write().map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        cache
            .as_mut()
            .ok_or_else(|| ClaimflowError::Storage("claim cache not loaded".to_string()))?
            .insert(record.claim_id.clone(), record.clone());

        Ok(())
    }

    fn load(&self, claim_id: &str) -> Result<Option<ClaimRecord>> {
        self.ensure_loaded()?;

        let cache = self.cache.read().map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        let records = cache
            .as_ref()
            .ok_or_else(|| ClaimflowError::Storage("claim cache not loaded".to_string()))?;

        Ok(records.get(claim_id).cloned())
    }

    fn list(&self) -> Result<Vec<ClaimRecord>> {
        self.ensure_loaded()?;

        let cache = self.cache.read().map_err(|e| ClaimflowError::Storage(e.to_string()))?;
        let records = cache
            .as_ref()
            .ok_or_else(|| ClaimflowError::Storage("claim cache not loaded".to_string()))?;

        let mut all: Vec<ClaimRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.claim_id.cmp(&b.claim_id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimState, FieldValue, Verdict, VerdictOutcome};
    use tempfile::TempDir;

    fn record(claim_id: &str, outcome: VerdictOutcome) -> ClaimRecord {
        let mut state = ClaimState::new(claim_id, vec![PathBuf::from("scan.pdf")]);
        state
            .extracted_fields
            .insert("patient_name".to_string(), FieldValue::text("Jane Doe"));

        ClaimRecord::of(
            &state,
            Verdict {
                outcome,
                rationale: "test rationale".to_string(),
                score: 0.8,
            },
            vec![PathBuf::from("report_clm.json")],
        )
    }

    fn create_test_store() -> (JsonlClaimStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlClaimStore::new(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_save_and_load() {
        let (store, _temp) = create_test_store();
        store.save(&record("clm-1", VerdictOutcome::Approve)).unwrap();

        let loaded = store.load("clm-1").unwrap().unwrap();
        assert_eq!(loaded.claim_id, "clm-1");
        assert_eq!(loaded.verdict.outcome, VerdictOutcome::Approve);
        assert_eq!(loaded.fields["patient_name"], FieldValue::text("Jane Doe"));
    }

    #[test]
    fn test_load_not_found() {
        let (store, _temp) = create_test_store();
        assert!(store.load("clm-missing").unwrap().is_none());
    }

    #[test]
    fn test_save_again_supersedes() {
        let (store, _temp) = create_test_store();
        store.save(&record("clm-1", VerdictOutcome::Query)).unwrap();
        store.save(&record("clm-1", VerdictOutcome::Approve)).unwrap();

        let loaded = store.load("clm-1").unwrap().unwrap();
        assert_eq!(loaded.verdict.outcome, VerdictOutcome::Approve);
        assert_eq!(store.list().unwrap().len(), 1);

        // both records stay in the append-only file
        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = JsonlClaimStore::new(temp_dir.path()).unwrap();
            store.save(&record("clm-1", VerdictOutcome::Query)).unwrap();
            store.save(&record("clm-1", VerdictOutcome::Reject)).unwrap();
            store.save(&record("clm-2", VerdictOutcome::Approve)).unwrap();
        }

        {
            let store = JsonlClaimStore::new(temp_dir.path()).unwrap();
            // last record per claim wins on reload
            let first = store.load("clm-1").unwrap().unwrap();
            assert_eq!(first.verdict.outcome, VerdictOutcome::Reject);
            assert_eq!(store.list().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let (store, _temp) = create_test_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlClaimStore::new(temp_dir.path()).unwrap();
        store.save(&record("clm-1", VerdictOutcome::Approve)).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file).unwrap();
        drop(file);

        let reloaded = JsonlClaimStore::new(temp_dir.path()).unwrap();
        assert_eq!(reloaded.list().unwrap().len(), 1);
    }
}
