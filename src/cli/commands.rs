//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - process: run one claim's documents through the pipeline
//! - history: list adjudicated claims
//! - show: print one adjudicated claim record

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Claimflow - agentic health insurance claim processing
#[derive(Parser, Debug)]
#[command(name = "claimflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a claim's documents end to end
    Process {
        /// Document files belonging to the claim
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Claim ID to use instead of generating one
        #[arg(long)]
        claim_id: Option<String>,
    },

    /// List adjudicated claims
    History,

    /// Show one adjudicated claim record
    Show {
        /// Claim ID to look up
        claim_id: String,
    },
}
