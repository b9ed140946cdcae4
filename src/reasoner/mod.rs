//! Reasoner boundary - the oracle that picks each cycle's action
//!
//! This module provides:
//! - The `Reasoner` trait the loop driver calls during Think
//! - `ClaimSummary`, the read-only view handed across the boundary
//! - Prompt rendering for LLM-backed reasoners
//! - Decision parsing from free-form oracle output
//! - `OpenAiReasoner`, the chat-completions implementation
//! - `ScriptedReasoner`, a deterministic stand-in for tests

pub mod client;
pub mod openai;
pub mod parse;
pub mod prompt;

pub use client::{ClaimSummary, Reasoner, ScriptedReasoner};
pub use openai::{OpenAiChat, OpenAiConfig, OpenAiReasoner};
pub use parse::parse_decision;
pub use prompt::{SYSTEM_PROMPT, render_user_prompt};
