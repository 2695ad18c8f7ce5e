//! Receipt / bill number extraction.

use tracing::debug;

use super::patterns::{RECEIPT_NUMBER, REFERENCE_NUMBER};
use super::{ExtractionMatch, FieldExtractor};

/// Receipt number extractor.
///
/// Prefers `bill no` / `invoice #` style labels over `ref no`. The captured
/// token must contain at least one digit.
#[derive(Default)]
pub struct ReceiptNumberExtractor;

impl ReceiptNumberExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for ReceiptNumberExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let result = self.extract_all(text).into_iter().next();
        if result.is_none() {
            debug!("No receipt number found");
        }
        result
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for (pattern, confidence) in [(&*RECEIPT_NUMBER, 0.9), (&*REFERENCE_NUMBER, 0.7)] {
            for caps in pattern.captures_iter(text) {
                let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let value = token.as_str().trim_end_matches(['-', '/']).to_uppercase();
                if value.chars().any(|c| c.is_ascii_digit()) && !results.iter().any(|m: &ExtractionMatch<String>| m.value == value) {
                    results.push(
                        ExtractionMatch::new(value, confidence, whole.as_str())
                            .with_position(whole.start(), whole.end()),
                    );
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number(text: &str) -> Option<String> {
        ReceiptNumberExtractor::new().extract(text).map(|m| m.value)
    }

    #[test]
    fn test_labeled_numbers() {
        assert_eq!(number("Bill No: 12345").as_deref(), Some("12345"));
        assert_eq!(number("Invoice # INV/2024-0042").as_deref(), Some("INV/2024-0042"));
        assert_eq!(number("TXN ID: a9f33b1").as_deref(), Some("A9F33B1"));
    }

    #[test]
    fn test_receipt_label_preferred_over_reference() {
        let text = "Ref No: 777\nReceipt No. 5521";
        assert_eq!(number(text).as_deref(), Some("5521"));
    }

    #[test]
    fn test_token_without_digit_rejected() {
        assert_eq!(number("Bill No: PENDING"), None);
        assert_eq!(number("Thank you"), None);
    }
}
