//! The typed slice of a processor payload that folds into claim state
//!
//! Processors return opaque `ActionResult.data`; the Observe step reads the
//! keys it understands through `StageData` and ignores the rest. This keeps
//! adapters free to report extra detail (timings, endpoint replies, report
//! paths) without widening the state model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::claim::{DocumentRef, FieldValue, Verdict};
use crate::error::Result;

/// Data a successful processor contributes to `ClaimState`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageData {
    /// Document references to add or update, keyed by path and stage
    #[serde(default)]
    pub documents: Vec<DocumentRef>,

    /// Claim fields to merge; existing keys are overwritten
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,

    /// Adjudication record, present only in the decide stage's payload
    #[serde(default)]
    pub verdict: Option<Verdict>,
}

impl StageData {
    /// Read the foldable slice out of an opaque result payload
    pub fn from_value(data: &Value) -> Result<Self> {
        if data.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(data.clone())?)
    }

    /// Convert back into an opaque payload for `ActionResult.data`
    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn with_documents(mut self, documents: Vec<DocumentRef>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }
}
