//! The control loop that drives one claim end to end
//!
//! This module provides:
//! - `ClaimRunner`, the bounded Think → Act → Observe driver
//! - `RunnerConfig`, the iteration and per-call timeout budgets

mod claim_runner;

pub use claim_runner::{ClaimRunner, RunnerConfig};
