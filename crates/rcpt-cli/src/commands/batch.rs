//! Batch processing command for multiple receipt images.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use rcpt_core::{ExtractedReceipt, ReceiptScanner, ScanMode};

use crate::output::{item_records, receipt_record, render, OutputFormat, ITEM_COLUMNS, RECEIPT_COLUMNS};

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching receipt images
    #[arg(required = true)]
    input: String,

    /// Output directory for per-file results and CSV reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also write summary.csv with one row per receipt
    #[arg(long)]
    summary: bool,

    /// Also write items.csv with one row per item
    #[arg(long)]
    items_csv: bool,

    /// Number of receipts scanned at once
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Run the reduced attempt set
    #[arg(long)]
    fast: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of scanning a single file.
struct FileResult {
    path: PathBuf,
    receipt: Option<ExtractedReceipt>,
    error: Option<String>,
    processing_time_ms: u64,
}

impl FileResult {
    fn file_name(&self) -> &str {
        self.path.file_name().and_then(|s| s.to_str()).unwrap_or("")
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching images found for pattern: {}", args.input);
    }

    println!("{} Found {} files to scan", style("ℹ").blue(), files.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let scanner = Arc::new(tokio::task::spawn_blocking(move || ReceiptScanner::new(config)).await?);
    let mode = if args.fast { ScanMode::Fast } else { scanner.default_mode() };

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let scanner = Arc::clone(&scanner);
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await?;
                let result = tokio::task::spawn_blocking(move || scan_file(&scanner, path, mode)).await?;
                Ok::<_, anyhow::Error>(result)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await??;
        progress.inc(1);

        if let Some(err) = &result.error {
            if args.continue_on_error {
                warn!("Failed to scan {}: {}", result.path.display(), err);
            } else {
                progress.abandon();
                error!("Failed to scan {}: {}", result.path.display(), err);
                anyhow::bail!("Scanning {} failed: {}", result.path.display(), err);
            }
        }
        results.push(result);
    }

    progress.finish_and_clear();

    if let Some(output_dir) = &args.output_dir {
        let mut used = HashSet::new();
        for result in &results {
            if let Some(receipt) = &result.receipt {
                let output_path = output_dir.join(output_name(&result.path, args.format, &mut used));
                fs::write(&output_path, render(receipt, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    let report_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    if args.summary {
        let path = report_dir.join("summary.csv");
        write_summary(&path, &results)?;
        println!("{} Summary written to {}", style("✓").green(), path.display());
    }
    if args.items_csv {
        let path = report_dir.join("items.csv");
        write_items(&path, &results)?;
        println!("{} Items written to {}", style("✓").green(), path.display());
    }

    let failed: Vec<&FileResult> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Scanned {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `<file name>.<ext>`, numbered when another input already took the name.
fn output_name(path: &Path, format: OutputFormat, used: &mut HashSet<String>) -> String {
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("receipt");
    let mut name = format!("{}.{}", base, format.extension());
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}-{}.{}", base, n, format.extension());
        n += 1;
    }
    name
}

fn scan_file(scanner: &ReceiptScanner, path: PathBuf, mode: ScanMode) -> FileResult {
    let start = Instant::now();
    let outcome = fs::read(&path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| Ok(scanner.scan(&bytes, mode)?));
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(receipt) => FileResult {
            path,
            receipt: Some(receipt),
            error: None,
            processing_time_ms,
        },
        Err(e) => FileResult {
            path,
            receipt: None,
            error: Some(e.to_string()),
            processing_time_ms,
        },
    }
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["file"];
    header.extend(RECEIPT_COLUMNS);
    header.extend(["processing_time_ms", "error"]);
    wtr.write_record(&header)?;

    for result in results {
        let mut row = vec![result.file_name().to_string()];
        match &result.receipt {
            Some(receipt) => row.extend(receipt_record(receipt)),
            None => row.extend(std::iter::repeat_n(String::new(), RECEIPT_COLUMNS.len())),
        }
        row.push(result.processing_time_ms.to_string());
        row.push(result.error.clone().unwrap_or_default());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_items(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["file", "merchant", "date"];
    header.extend(ITEM_COLUMNS);
    wtr.write_record(&header)?;

    for result in results {
        let Some(receipt) = &result.receipt else {
            continue;
        };
        let merchant = receipt.merchant.clone().unwrap_or_default();
        let date = receipt.date.map(|d| d.to_string()).unwrap_or_default();
        for item in item_records(receipt) {
            let mut row = vec![result.file_name().to_string(), merchant.clone(), date.clone()];
            row.extend(item);
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rcpt_core::ReceiptExtractor;

    fn scanned(name: &str, text: &str) -> FileResult {
        FileResult {
            path: PathBuf::from(name),
            receipt: Some(ReceiptExtractor::new().with_max_year(2030).extract(text)),
            error: None,
            processing_time_ms: 12,
        }
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a/receipt.JPG")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("README")));
    }

    #[test]
    fn test_output_names_do_not_collide() {
        let mut used = HashSet::new();
        let names: Vec<String> = ["in/a.png", "in/a.jpg", "other/a.png", "in/b"]
            .iter()
            .map(|p| output_name(Path::new(p), OutputFormat::Json, &mut used))
            .collect();
        assert_eq!(names, vec!["a.png.json", "a.jpg.json", "a.png-2.json", "b.json"]);
    }

    #[test]
    fn test_reports() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            scanned("one.png", "CORNER STORE\nDate: 05/03/2024\nMILK 2 1.50 3.00\nBREAD 1 2.25 2.25\nTOTAL 5.25"),
            FileResult {
                path: PathBuf::from("two.png"),
                receipt: None,
                error: Some("unreadable image: bad".to_string()),
                processing_time_ms: 1,
            },
        ];

        let summary = dir.path().join("summary.csv");
        write_summary(&summary, &results).unwrap();
        let content = fs::read_to_string(&summary).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file,merchant,date,total"));
        assert!(lines[2].starts_with("two.png,"));
        assert!(lines[2].ends_with("unreadable image: bad"));

        let items = dir.path().join("items.csv");
        write_items(&items, &results).unwrap();
        let content = fs::read_to_string(&items).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("one.png,"));
        assert!(content.contains(",2024-03-05,Milk,2,1.50,3.00"));
    }
}
