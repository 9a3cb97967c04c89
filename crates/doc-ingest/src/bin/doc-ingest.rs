//! `doc-ingest` command line
//!
//! ```bash
//! doc-ingest ingest ./inbox              # every supported file, recursively
//! doc-ingest ingest scan.png -o ./out    # one file, custom output directory
//! doc-ingest check-conflicts ./inbox     # dry run of the naming pre-scan
//! doc-ingest list --json                # machine-readable listing
//! doc-ingest clean
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_ingest::ingestion::{BatchPlan, BatchReport, FileOutcome, IngestPipeline};
use doc_ingest::ocr::OcrEngine;
use doc_ingest::types::{ArtifactHeader, FileType};
use doc_ingest::IngestConfig;

/// Extract plain text from scanned images, PDFs, Word documents and text files
#[derive(Parser)]
#[command(name = "doc-ingest", version)]
struct Cli {
    /// Output directory for extracted text files
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Configuration file (TOML). Defaults to the per-user config if present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a single file or every supported file under a directory
    Ingest {
        /// File or directory
        path: PathBuf,
    },
    /// List extracted files with their source
    List,
    /// Delete every extracted file from the output directory
    Clean,
    /// Show naming conflicts for a file or directory without extracting
    CheckConflicts {
        /// File or directory
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = IngestConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
    if let Some(output) = cli.output {
        config.output_dir = output;
    }

    let pipeline = IngestPipeline::new(config);

    match cli.command {
        Commands::Ingest { path } => ingest(&pipeline, &path, cli.json),
        Commands::List => list(&pipeline, cli.json),
        Commands::Clean => clean(&pipeline),
        Commands::CheckConflicts { path } => check_conflicts(&pipeline, &path, cli.json),
    }
}

fn ingest(pipeline: &IngestPipeline, path: &Path, json: bool) -> anyhow::Result<()> {
    pipeline.store().ensure_dir().context("creating output directory")?;
    warn_missing_tools(pipeline);

    if json {
        return if path.is_dir() {
            print_json(&pipeline.process_directory(path)?)
        } else {
            print_json(&pipeline.process_file(path)?)
        };
    }

    if path.is_dir() {
        let total = pipeline.collect_inputs(path)?.len();
        let pb = progress_bar(total as u64);
        let report = pipeline.process_directory_with(path, |_, entry| {
            let name = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            pb.set_message(name);
            pb.inc(1);
        })?;
        pb.finish_and_clear();
        print_report(&report, pipeline);
        return Ok(());
    }

    match pipeline.process_file(path)? {
        FileOutcome::Written {
            artifact,
            chars,
            lines,
            method,
            alternative,
        } => {
            println!("{} {}", style("✓ SUCCESS").green().bold(), path.display());
            println!("  Output file: {}", artifact.display());
            if alternative {
                println!("  {}", style("(alternative name, a different source owns the base name)").yellow());
            }
            println!("  Text length: {} characters, {} lines (via {})", chars, lines, method);
        }
        FileOutcome::Skipped { existing, .. } => {
            println!(
                "{} {} already processed as {}",
                style("⏭ SKIPPED").cyan().bold(),
                path.display(),
                existing.display()
            );
        }
    }
    Ok(())
}

fn print_report(report: &BatchReport, pipeline: &IngestPipeline) {
    for entry in &report.outcomes {
        if let Err(reason) = &entry.outcome {
            println!("{} {}: {}", style("✗").red(), entry.path.display(), reason);
        }
    }

    println!();
    println!("{}", style("PROCESSING SUMMARY").bold());
    println!("  Total files found:          {}", report.found);
    println!("  Successfully processed:     {}", style(report.processed).green());
    println!("  Failed:                     {}", style(report.failed).red());
    println!("  Skipped (already processed): {}", style(report.skipped).cyan());
    match report.success_rate() {
        Some(rate) => println!("  Success rate:               {:.1}%", rate * 100.0),
        None => println!("  No files to process"),
    }
    println!("  Output directory:           {}", pipeline.store().dir().display());
}

fn list(pipeline: &IngestPipeline, json: bool) -> anyhow::Result<()> {
    let entries = pipeline.list_artifacts()?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No extracted files in {}", pipeline.store().dir().display());
        return Ok(());
    }

    println!("Extracted files ({}):", entries.len());
    for entry in entries {
        println!(
            "  - {} ({} bytes) <- {}",
            entry.name,
            entry.size_bytes,
            entry.header.source_file.as_deref().unwrap_or("Unknown")
        );
    }
    Ok(())
}

fn clean(pipeline: &IngestPipeline) -> anyhow::Result<()> {
    let removed = pipeline.clean_output()?;
    if removed == 0 {
        println!("Output directory is already empty");
    } else {
        println!("{} Removed {} files", style("✓").green(), removed);
    }
    Ok(())
}

fn check_conflicts(pipeline: &IngestPipeline, path: &Path, json: bool) -> anyhow::Result<()> {
    let plan = pipeline.check_conflicts(path)?;
    if json {
        return print_json(&plan);
    }
    print_plan(&plan);

    let existing = pipeline.list_artifacts()?;
    if !existing.is_empty() {
        println!("\nExisting extracted files ({}):", existing.len());
        for entry in existing.iter().take(10) {
            println!(
                "  - {} <- {}",
                entry.name,
                entry.header.source_file.as_deref().unwrap_or("Unknown")
            );
        }
        if existing.len() > 10 {
            println!("  ... and {} more files", existing.len() - 10);
        }
    }
    Ok(())
}

fn print_plan(plan: &BatchPlan) {
    if plan.conflict_count() == 0 {
        println!(
            "{} No naming conflicts detected ({} files can be processed)",
            style("✓").green(),
            plan.clean.len()
        );
        return;
    }

    println!(
        "{} Found {} potential conflicts",
        style("!").yellow().bold(),
        plan.conflict_count()
    );

    if !plan.skipped.is_empty() {
        println!("\nFiles that will be SKIPPED (already processed):");
        for skip in &plan.skipped {
            println!("  - {}", skip.source.display());
            let previous = std::fs::read_to_string(&skip.existing)
                .ok()
                .and_then(|content| ArtifactHeader::parse(&content).extraction_date);
            if let Some(date) = previous {
                println!("    Previous extraction: {}", date);
            }
        }
    }

    if !plan.renamed.is_empty() {
        println!("\nFiles requiring ALTERNATIVE NAMES:");
        for (source, name) in &plan.renamed {
            println!("  - {} -> {}", source.display(), name);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn warn_missing_tools(pipeline: &IngestPipeline) {
    let engine = OcrEngine::new(pipeline.config());
    if !engine.is_available() {
        eprintln!(
            "{} OCR engine not found; images and scanned PDFs will fail. Install: {}",
            style("warning:").yellow().bold(),
            FileType::Image.required_tools().unwrap_or("tesseract")
        );
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
