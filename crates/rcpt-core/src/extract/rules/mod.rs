//! Rule-based field extractors for retail receipts.

pub mod amounts;
pub mod dates;
pub mod items;
pub mod merchant;
pub mod patterns;
pub mod payment;
pub mod receipt_number;
pub mod tax;

pub use amounts::{derive_subtotal, parse_amount, SubtotalExtractor, TotalExtractor};
pub use dates::{parse_fuzzy_date, DateExtractor};
pub use items::ItemExtractor;
pub use merchant::MerchantExtractor;
pub use payment::PaymentMethodExtractor;
pub use receipt_number::ReceiptNumberExtractor;
pub use tax::TaxExtractor;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extracted value with its confidence and the text it came from.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

/// Normalize OCR text line by line.
///
/// Line endings become `\n`, runs of whitespace collapse to one space, and
/// blank lines are dropped.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
