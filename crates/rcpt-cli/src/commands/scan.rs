//! Scan command - extract data from a single receipt image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use rcpt_core::{ReceiptScanner, ScanMode, ScanStatus};

use crate::output::{render, OutputFormat};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Receipt image (PNG, JPEG, TIFF, BMP, WebP)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Run the reduced attempt set
    #[arg(long)]
    fast: bool,

    /// Write the preprocessed image variants to this directory
    #[arg(long)]
    save_variants: Option<PathBuf>,

    /// Show OCR and extraction confidence
    #[arg(long)]
    show_confidence: bool,

    /// Report fields a reviewer should check
    #[arg(long)]
    validate: bool,
}

pub async fn run(args: ScanArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let bytes = fs::read(&args.input)?;

    info!("Scanning {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message("Loading OCR engines...");

    let save_variants = args.save_variants.clone();
    let fast = args.fast;
    let (receipt, variants) = tokio::task::spawn_blocking(move || {
        let scanner = ReceiptScanner::new(config);
        let mode = if fast { ScanMode::Fast } else { scanner.default_mode() };
        debug!("Engines: {:?}, mode {:?}", scanner.engine_names(), mode);
        scanner.scan_with_variants(&bytes, mode)
    })
    .await??;

    pb.finish_and_clear();

    if let Some(dir) = &save_variants {
        variants.save_to_dir(dir)?;
        eprintln!(
            "{} Saved {} variants to {}",
            style("✓").green(),
            variants.len(),
            dir.display()
        );
    }

    if receipt.status == ScanStatus::NoRecognitionResult {
        eprintln!(
            "{} No OCR engine recognized any text. Is tesseract installed or are the neural models configured?",
            style("!").yellow()
        );
    }

    if args.validate {
        let issues = receipt.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = render(&receipt, args.format)?;

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

    if args.show_confidence {
        println!();
        println!(
            "{} OCR confidence: {:.1}% ({})",
            style("ℹ").blue(),
            receipt.ocr_confidence * 100.0,
            receipt.ocr_method.as_deref().unwrap_or("none")
        );
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            receipt.confidence_score * 100.0
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
