//! Renditions of an [`ExtractedReceipt`] for files and the terminal.

use rcpt_core::{ExtractedReceipt, ScanStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Column names of one receipt row.
pub const RECEIPT_COLUMNS: [&str; 12] = [
    "merchant",
    "date",
    "total",
    "subtotal",
    "tax",
    "receipt_number",
    "payment_method",
    "item_count",
    "confidence_score",
    "ocr_confidence",
    "ocr_method",
    "status",
];

/// Column names of one item row, after the source columns.
pub const ITEM_COLUMNS: [&str; 4] = ["name", "quantity", "unit_price", "total_price"];

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Values matching [`RECEIPT_COLUMNS`].
pub fn receipt_record(receipt: &ExtractedReceipt) -> Vec<String> {
    vec![
        opt(&receipt.merchant),
        opt(&receipt.date),
        opt(&receipt.total),
        opt(&receipt.subtotal),
        opt(&receipt.tax),
        opt(&receipt.receipt_number),
        opt(&receipt.payment_method),
        receipt.items.len().to_string(),
        format!("{:.2}", receipt.confidence_score),
        format!("{:.2}", receipt.ocr_confidence),
        opt(&receipt.ocr_method),
        status_label(receipt.status).to_string(),
    ]
}

/// One row per item, values matching [`ITEM_COLUMNS`].
pub fn item_records(receipt: &ExtractedReceipt) -> Vec<Vec<String>> {
    receipt
        .items
        .iter()
        .map(|item| {
            vec![
                item.name.clone(),
                item.quantity.to_string(),
                item.unit_price.to_string(),
                item.total_price.to_string(),
            ]
        })
        .collect()
}

fn status_label(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Recognized => "recognized",
        ScanStatus::NoRecognitionResult => "no_recognition_result",
    }
}

pub fn render(receipt: &ExtractedReceipt, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(receipt)?),
        OutputFormat::Csv => format_csv(receipt),
        OutputFormat::Text => Ok(format_text(receipt)),
    }
}

fn format_csv(receipt: &ExtractedReceipt) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RECEIPT_COLUMNS)?;
    wtr.write_record(receipt_record(receipt))?;
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(receipt: &ExtractedReceipt) -> String {
    let mut output = String::new();

    if receipt.status == ScanStatus::NoRecognitionResult {
        output.push_str("No text recognized.\n");
        return output;
    }

    output.push_str(&format!(
        "Merchant: {}\n",
        receipt.merchant.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "Date: {}\n",
        receipt
            .date
            .map(|d| d.format("%d %b %Y").to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    if let Some(number) = &receipt.receipt_number {
        output.push_str(&format!("Receipt: {}\n", number));
    }

    if !receipt.items.is_empty() {
        output.push_str("\nItems:\n");
        for item in &receipt.items {
            output.push_str(&format!(
                "  {:<32} {:>6} x {:>10} = {:>10}\n",
                item.name, item.quantity, item.unit_price, item.total_price
            ));
        }
    }

    output.push('\n');
    if let Some(subtotal) = receipt.subtotal {
        output.push_str(&format!("  Subtotal: {}\n", subtotal));
    }
    if let Some(tax) = receipt.tax {
        output.push_str(&format!("  Tax:      {}\n", tax));
    }
    output.push_str(&format!("  Total:    {}\n", opt(&receipt.total)));
    if let Some(method) = receipt.payment_method {
        output.push_str(&format!("\nPaid by {}\n", method));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rcpt_core::ReceiptExtractor;

    fn receipt() -> ExtractedReceipt {
        ReceiptExtractor::new()
            .with_max_year(2030)
            .extract("CORNER STORE\nDate: 05/03/2024\nMILK 2 1.50 3.00\nTOTAL: $3.00\nPaid by cash")
    }

    #[test]
    fn test_record_matches_columns() {
        let record = receipt_record(&receipt());
        assert_eq!(record.len(), RECEIPT_COLUMNS.len());
        assert_eq!(record[1], "2024-03-05");
        assert_eq!(record[2], "3.00");
        assert_eq!(record[11], "recognized");
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let csv = render(&receipt(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("merchant,date,total"));
    }

    #[test]
    fn test_text_for_empty_scan() {
        let text = render(&ExtractedReceipt::no_recognition(), OutputFormat::Text).unwrap();
        assert_eq!(text, "No text recognized.\n");
    }

    #[test]
    fn test_item_rows() {
        let rows = item_records(&receipt());
        assert_eq!(rows, vec![vec!["Milk".to_string(), "2".to_string(), "1.50".to_string(), "3.00".to_string()]]);
    }
}
