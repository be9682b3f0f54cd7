//! Batch processing command for multiple invoice PDFs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use factura_core::models::config::FacturaConfig;
use factura_core::{
    BatchRunner, DocumentProcessor, FacturaError, FileOutcome, IngestFile, IngestRequest,
    OcrLanguage, TemplateStore,
};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Vendor whose templates are tried first
    #[arg(long)]
    vendor: String,

    /// Output directory for per-file JSON results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers (default: from config)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Per-file timeout in seconds (default: from config)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// OCR every page, even ones with embedded text
    #[arg(long)]
    force_ocr: bool,

    /// OCR language (es, gl or en)
    #[arg(short, long)]
    language: Option<OcrLanguage>,

    /// Mask emails, phone numbers and IBANs in the output
    #[arg(long)]
    redact: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Load configuration
    let mut config = if let Some(path) = config_path {
        FacturaConfig::from_file(std::path::Path::new(path))?
    } else {
        FacturaConfig::default()
    };

    if args.redact {
        config.redaction.enabled = true;
    }
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }
    if let Some(timeout) = args.timeout_secs {
        config.batch.timeout_secs = timeout;
    }

    // Expand glob patterns
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in &args.patterns {
        paths.extend(glob(pattern)?.filter_map(|r| r.ok()).filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            ext.eq_ignore_ascii_case("pdf")
        }));
    }

    if paths.is_empty() {
        anyhow::bail!(
            "No matching files found for: {}",
            args.patterns.join(", ")
        );
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        paths.len()
    );

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    // Read everything up front; the runner owns the bytes from here on
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("invoice.pdf")
            .to_string();
        let bytes = fs::read(path)?;
        files.push(IngestFile::new(filename, "application/pdf", bytes));
    }

    let store = TemplateStore::load(&config.templates.dir)?;
    let processor = Arc::new(DocumentProcessor::new(config, store));
    let runner = BatchRunner::new(processor);

    // Ctrl-C marks the remaining files as cancelled instead of killing
    // jobs already running
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let mut request = IngestRequest::new(files, args.vendor.clone());
    request.force_ocr = args.force_ocr;
    request.language = args.language;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Processing {} files...", paths.len()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcomes = match runner.run(request).await {
        Ok(outcomes) => outcomes,
        Err(err) => {
            pb.finish_and_clear();
            if let FacturaError::Validation(validation) = &err {
                eprintln!("{}", style("Invalid request:").red());
                for violation in &validation.violations {
                    eprintln!("  - {}: {}", violation.field, violation.error);
                }
            }
            return Err(err.into());
        }
    };

    pb.finish_with_message("Complete");

    // Write per-file outputs
    if let Some(ref output_dir) = args.output_dir {
        for outcome in &outcomes {
            if let Some(result) = outcome.as_ok() {
                let stem = Path::new(&result.filename)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("invoice");
                let output_path = output_dir.join(format!("{}.json", stem));
                fs::write(&output_path, serde_json::to_string_pretty(result)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    // Generate summary if requested
    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let ok_count = outcomes.iter().filter(|o| o.is_ok()).count();
    let failed: Vec<&FileOutcome> = outcomes.iter().filter(|o| !o.is_ok()).collect();

    // Print summary
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(ok_count).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            if let FileOutcome::Err { filename, error } = outcome {
                println!("  - {}: {}", filename, error);
            }
        }
    }

    Ok(())
}

fn write_summary(path: &PathBuf, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "template",
        "pages",
        "scanned_pages",
        "confidence",
        "error",
    ])?;

    for outcome in outcomes {
        match outcome {
            FileOutcome::Ok(result) => {
                wtr.write_record([
                    result.filename.as_str(),
                    "success",
                    result.template_id.as_str(),
                    &result.pages_count.to_string(),
                    &result.diagnostics.scanned_pages.to_string(),
                    &format!("{:.2}", result.overall_confidence),
                    "",
                ])?;
            }
            FileOutcome::Err { filename, error } => {
                wtr.write_record([filename.as_str(), "error", "", "", "", "", error.as_str()])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
