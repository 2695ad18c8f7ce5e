//! Receipt field extraction from OCR text.

mod parser;
pub mod rules;

pub use parser::ReceiptExtractor;
pub use rules::{normalize_text, parse_amount, ExtractionMatch, FieldExtractor};
