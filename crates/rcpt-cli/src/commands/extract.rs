//! Extract command - run field extraction on recognized text.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use rcpt_core::ReceiptExtractor;

use crate::output::{render, OutputFormat};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Text file with OCR output, or "-" for stdin
    #[arg(required = true)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let text = if args.input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        let path = Path::new(&args.input);
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
        fs::read_to_string(path)?
    };

    let receipt = ReceiptExtractor::with_config(config.extraction).extract(&text);
    info!(
        "Extracted {} fields, score {:.2}",
        receipt.populated_fields(),
        receipt.confidence_score
    );

    let output = render(&receipt, args.format)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &output)?;
            println!("{} Output written to {}", style("✓").green(), path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}
