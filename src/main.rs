use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use claimflow::ClaimflowError;
use claimflow::config::Config;
use claimflow::domain::{ClaimState, RunOutcome, VerdictOutcome};
use claimflow::engine::ClaimEngine;
use claimflow::store::{ClaimRecord, ClaimStore, JsonlClaimStore};
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "claimflow=debug"
    } else {
        "claimflow=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Process { files, claim_id } => {
            handle_process_command(config, files.clone(), claim_id.clone()).await
        }
        Commands::History => handle_history_command(config),
        Commands::Show { claim_id } => handle_show_command(config, claim_id),
    }
}

async fn handle_process_command(
    config: &Config,
    files: Vec<PathBuf>,
    claim_id: Option<String>,
) -> Result<()> {
    let engine = ClaimEngine::from_config(config).context("Failed to assemble the claim engine")?;

    println!(
        "{} {} document(s)",
        "Processing claim:".cyan(),
        files.len()
    );

    // Ctrl-C requests cancellation at the next cycle boundary
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_on_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling after the current cycle");
            cancel_on_signal.store(true, Ordering::Relaxed);
        }
    });

    let (state, outcome) = engine.process_with_cancel(files, claim_id, cancel).await;

    print_run(&state, &outcome);
    if outcome.is_completed() {
        println!(
            "Reports written to {}",
            config.output.reports_dir.display().to_string().bold()
        );
    }

    Ok(())
}

fn handle_history_command(config: &Config) -> Result<()> {
    let store = JsonlClaimStore::new(&config.output.data_dir)
        .context("Failed to open the claim store")?;
    let records = store.list().context("Failed to read claim history")?;

    if records.is_empty() {
        println!("{}", "No adjudicated claims yet".yellow());
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {}  score {:.2}  {}",
            record.claim_id.bold(),
            colored_outcome(record.verdict.outcome),
            record.verdict.score,
            format_timestamp(record.recorded_at)
        );
    }
    println!("{} claim(s)", records.len());

    Ok(())
}

fn handle_show_command(config: &Config, claim_id: &str) -> Result<()> {
    let store = JsonlClaimStore::new(&config.output.data_dir)
        .context("Failed to open the claim store")?;
    let record = store
        .load(claim_id)
        .context("Failed to read the claim store")?
        .ok_or_else(|| ClaimflowError::ClaimNotFound(claim_id.to_string()))?;

    print_record(&record);
    Ok(())
}

fn print_run(state: &ClaimState, outcome: &RunOutcome) {
    println!();
    println!("{} {}", "Claim:".cyan(), state.claim_id.bold());

    for (index, step) in state.history.iter().enumerate() {
        let marker = if step.success {
            "ok".green()
        } else {
            "failed".red()
        };
        let action = step
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "(no action)".to_string());
        println!("  {:>2}. {:<12} {}", index + 1, action, marker);
    }

    let rendered = match outcome {
        RunOutcome::Completed => outcome.to_string().green(),
        RunOutcome::Cancelled | RunOutcome::IterationLimitExceeded => {
            outcome.to_string().yellow()
        }
        RunOutcome::Failed(_) => outcome.to_string().red(),
    };
    println!("{} {}", "Outcome:".cyan(), rendered);

    if let Some(verdict) = &state.verdict {
        println!(
            "{} {} (completeness {:.2})",
            "Verdict:".cyan(),
            colored_outcome(verdict.outcome),
            verdict.score
        );
        println!("  {}", verdict.rationale);
    }
}

fn print_record(record: &ClaimRecord) {
    println!("{} {}", "Claim:".cyan(), record.claim_id.bold());
    println!(
        "{} {} (completeness {:.2})",
        "Verdict:".cyan(),
        colored_outcome(record.verdict.outcome),
        record.verdict.score
    );
    println!("{} {}", "Recorded:".cyan(), format_timestamp(record.recorded_at));
    println!("{} {}", "Iterations:".cyan(), record.iterations);

    println!("{}", "Fields:".cyan());
    if record.fields.is_empty() {
        println!("  (none)");
    } else {
        for (name, value) in &record.fields {
            println!("  {name}: {value}");
        }
    }

    println!("{}", "Documents:".cyan());
    for doc in &record.documents {
        println!("  {}", doc.path.display());
    }

    println!("{}", "Rationale:".cyan());
    println!("  {}", record.verdict.rationale);
}

fn colored_outcome(outcome: VerdictOutcome) -> ColoredString {
    match outcome {
        VerdictOutcome::Approve => outcome.as_str().green(),
        VerdictOutcome::Reject => outcome.as_str().red(),
        VerdictOutcome::Query => outcome.as_str().yellow(),
    }
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose());

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
