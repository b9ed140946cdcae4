//! CLI module for claimflow - command-line interface and subcommands.
//!
//! Provides the entry point with subcommands for processing a claim and
//! querying adjudicated history.

pub mod commands;

pub use commands::Cli;
