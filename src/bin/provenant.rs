//! # Provenant CLI - Audit a deployed tree against a baseline
//!
//! Compares an old and a new snapshot of a directory, attributes every added or
//! modified file to a known origin and writes a CSV report.
//!
//! ## Usage
//! ```bash
//! # Compare a backup against the live site using ./config.json
//! provenant -o /srv/backups/www -n /srv/www -r report.csv
//!
//! # Explicit configuration and debug logging
//! provenant -o old/ -n new/ -r report.csv -c audit.json -v
//! ```

use clap::Parser;
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use provenant::config::DEFAULT_CONFIG_FILE;
use provenant::utils::format_bytes;
use provenant::{AuditBuilder, AuditConfig, AuditReport, ChangeKind, ProgressInfo, ProvenantError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Compare two snapshots of files and determine the provenance of changed files
#[derive(Parser)]
#[command(name = "provenant")]
#[command(version)]
#[command(about = "Compare two snapshots of files and try to determine provenance of modified files")]
struct Cli {
    /// Baseline (trusted) snapshot root
    #[arg(short, long)]
    old: PathBuf,

    /// Live snapshot root
    #[arg(short, long)]
    new: PathBuf,

    /// CSV report output path
    #[arg(short, long)]
    report: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(if e.is_startup() { 2 } else { 1 });
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AuditConfig::load(&cli.config)?;
    for path in [&cli.old, &cli.new] {
        if !path.is_dir() {
            return Err(ProvenantError::configuration(format!("{:?} is not a directory", path)));
        }
    }

    println!("{}", "Loading provenance sources...".blue().bold());
    let mut builder = AuditBuilder::new().config(config);

    let progress = if cli.no_progress {
        None
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        let bar = pb.clone();
        builder = builder.progress_callback(Arc::new(move |info: ProgressInfo| {
            if let Some(total) = info.total {
                bar.set_length(total as u64);
            }
            bar.set_position(info.processed as u64);
            if let Some(item) = info.current_item {
                bar.set_message(item);
            }
        }));
        Some(pb)
    };

    let audit = builder.build(cli.new.clone())?;
    println!(
        "{} {} sources ready: {}",
        "✓".green().bold(),
        audit.resolver().len(),
        audit.resolver().source_names().join(", ").cyan()
    );

    println!("Comparing {} and {}...", cli.old.display(), cli.new.display());
    let result = audit.run(&cli.old);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let report = result?;

    report.write_csv(&cli.report)?;
    print_summary(&report);
    println!("  Report: {}", cli.report.display().to_string().cyan());
    Ok(())
}

fn print_summary(report: &AuditReport) {
    let summary = &report.summary;
    println!("{} Audit complete", "✓".green().bold());
    println!("  Added: {}", summary.files_added.to_string().green());
    println!("  Modified: {}", summary.files_modified.to_string().yellow());
    println!("  Removed: {}", summary.files_removed.to_string().red());
    println!("  Unchanged: {}", summary.files_unchanged.to_string().dimmed());
    println!(
        "  Size change: +{} / -{}",
        format_bytes(summary.bytes_added),
        format_bytes(summary.bytes_removed)
    );
    println!("  Time: {}", format_duration(std::time::Duration::from_millis(report.duration.as_millis() as u64)).to_string().cyan());

    if !report.rows.is_empty() {
        println!("\n{}", "By source:".bold());
        for (source, count) in report.source_counts() {
            let line = format!("  {}: {}", source, count);
            if source == provenant::types::UNKNOWN_SOURCE {
                println!("{}", line.red().bold());
            } else {
                println!("{}", line);
            }
        }
    }

    let unknown: Vec<_> = report
        .unattributed()
        .filter(|r| r.change.kind != ChangeKind::Removed)
        .collect();
    if !unknown.is_empty() {
        println!("\n{}", "Unattributed files:".yellow().bold());
        for row in unknown.iter().take(20) {
            println!("  {} {}", row.change.kind.to_string().yellow(), row.path());
        }
        if unknown.len() > 20 {
            println!("  ... and {} more (see report)", unknown.len() - 20);
        }
    }
}
