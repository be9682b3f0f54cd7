//! Process command - extract structured data from a single invoice PDF.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use factura_core::models::config::FacturaConfig;
use factura_core::models::result::FieldValue;
use factura_core::{
    DocumentProcessor, OcrLanguage, ProcessOptions, ProcessingResult, TemplateStore,
};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Vendor whose templates are tried first
    #[arg(long)]
    vendor: Option<String>,

    /// OCR every page, even ones with embedded text
    #[arg(long)]
    force_ocr: bool,

    /// OCR language (es, gl or en)
    #[arg(short, long)]
    language: Option<OcrLanguage>,

    /// Mask emails, phone numbers and IBANs in the output
    #[arg(long)]
    redact: bool,

    /// Extract layout blocks even when the config disables them
    #[arg(long)]
    layout: bool,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON result record
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
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
    if args.layout {
        config.pdf.extract_blocks = true;
    }

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension != "pdf" {
        anyhow::bail!("Unsupported file format: {} (expected a PDF)", extension);
    }

    info!("Processing file: {}", args.input.display());

    // Template store load is fatal on a broken library, before any
    // file bytes are touched
    let store = TemplateStore::load(&config.templates.dir)?;
    let processor = DocumentProcessor::new(config, store);

    let filename = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("invoice.pdf")
        .to_string();
    let data = fs::read(&args.input)?;

    let options = ProcessOptions {
        vendor: args.vendor.clone(),
        force_ocr: args.force_ocr,
        language: args.language,
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message("Extracting invoice data...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = processor.process(&filename, &data, &options)?;

    pb.finish_with_message("Done");

    if !result.template_warnings.is_empty() {
        eprintln!("{}", style("Template selection:").yellow());
        for warning in &result.template_warnings {
            eprintln!("  - {}", warning);
        }
    }

    // Format output
    let output = format_result(&result, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    // Show summary
    if args.show_confidence {
        println!();
        println!(
            "{} Overall confidence: {:.1}%",
            style("ℹ").blue(),
            result.overall_confidence * 100.0
        );
        println!(
            "{} Template {} over {} pages, {} via OCR",
            style("ℹ").blue(),
            result.template_id,
            result.pages_count,
            result.diagnostics.scanned_pages
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_result(result: &ProcessingResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_text(result: &ProcessingResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", result.filename));
    output.push_str(&format!("Template: {}\n", result.template_id));
    output.push_str(&format!(
        "Pages: {} ({} scanned)\n",
        result.pages_count, result.diagnostics.scanned_pages
    ));
    output.push_str(&format!("SHA-256: {}\n", result.hash_sha256));
    output.push('\n');

    output.push_str("Fields:\n");
    for (name, field) in &result.fields {
        let value = match &field.value {
            Some(FieldValue::Text(text)) => text.clone(),
            Some(FieldValue::Taxes(lines)) => lines
                .iter()
                .map(|line| format!("{} {}", line.kind, line.amount))
                .collect::<Vec<_>>()
                .join("; "),
            None => "-".to_string(),
        };
        output.push_str(&format!(
            "  {:<20} {}  ({:.0}%)\n",
            name,
            value,
            field.confidence * 100.0
        ));
    }

    output.push('\n');
    output.push_str(&format!(
        "Overall confidence: {:.1}%\n",
        result.overall_confidence * 100.0
    ));

    if let Some(entities) = &result.entities {
        output.push_str(&format!("Redacted entities: {}\n", entities.len()));
    }

    output
}
