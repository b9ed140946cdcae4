//! Claimflow - agentic health insurance claim processing
//!
//! Claimflow runs each claim through a fixed document pipeline driven by a
//! ReAct-style loop: a reasoning oracle proposes the next action, a processor
//! executes it, and the observation folds back into the claim state.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod id;
pub mod pipeline;
pub mod reasoner;
pub mod runner;
pub mod store;

pub use error::{ClaimflowError, Result};
