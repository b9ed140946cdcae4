//! Domain types for claimflow
//!
//! This module contains all core domain types:
//! - ClaimState: the single mutable record threaded through the loop
//! - Action: the seven recognized pipeline actions and their stage mapping
//! - Decision / ActionResult / StepRecord: one loop cycle's input, output, and audit entry
//! - StageData: the typed slice of a processor payload that folds into state
//! - RunOutcome: how a run over one claim ended

pub mod action;
pub mod claim;
pub mod outcome;
pub mod payload;
pub mod step;

pub use action::{Action, ALL_ACTIONS};
pub use claim::{
    ClaimState, ClaimStatus, DocumentRef, DocumentStage, FieldValue, Verdict, VerdictOutcome,
};
pub use outcome::RunOutcome;
pub use payload::StageData;
pub use step::{ActionResult, Decision, StepRecord};
