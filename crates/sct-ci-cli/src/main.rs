//! sct-ci - CI harness for the Spinal Cord Toolbox
//!
//! One flagless invocation runs the whole pipeline from the current
//! checkout: install, verify the command set, test under multi-process
//! coverage, combine the fragments, lint gate. The process exit code is
//! the pipeline's derived status.

use anyhow::{Context, Result};
use clap::Parser;
use sct_ci::{init_logging, Pipeline, RunPlan};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "sct-ci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CI harness for the Spinal Cord Toolbox", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Checkout to run against (default: current directory)
    #[arg(long, default_value = ".")]
    workdir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_logging(cli.json, level);

    let workdir = cli
        .workdir
        .canonicalize()
        .with_context(|| format!("working directory {} not found", cli.workdir.display()))?;

    let plan = RunPlan::for_workdir(workdir);
    let outcome = Pipeline::run(&plan).await;

    println!();
    for report in &outcome.stages {
        let status = if report.passed { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, report.stage_name, report.duration_ms, report.exit_code
        );
    }
    println!();
    println!(
        "Summary: {}/{} stages passed ({}ms)",
        outcome.passed_count(),
        outcome.stages.len(),
        outcome.duration_ms
    );

    if outcome.success {
        println!("\n✓ All checks passed!");
        Ok(())
    } else {
        println!("\n✗ Pipeline failed");
        std::process::exit(outcome.exit_code());
    }
}
