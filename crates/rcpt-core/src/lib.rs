//! Core library for receipt scanning.
//!
//! This crate provides:
//! - Image preprocessing into OCR-friendly variants (EXIF orientation,
//!   perspective correction, contrast and threshold recipes)
//! - Multi-engine OCR arbitration (Tesseract and a pure-Rust ONNX engine)
//! - Receipt field extraction (merchant, date, totals, tax, items, payment)

pub mod error;
pub mod extract;
pub mod models;
#[cfg(feature = "imaging")]
pub mod ocr;
#[cfg(feature = "imaging")]
pub mod preprocess;
#[cfg(feature = "imaging")]
mod scanner;

pub use error::{OcrError, RcptError, Result, ScanError};
pub use extract::{parse_amount, ReceiptExtractor};
pub use models::config::{RcptConfig, ScanMode};
pub use models::receipt::{ExtractedReceipt, ItemLine, PaymentMethod, ScanStatus};
#[cfg(feature = "imaging")]
pub use ocr::{OcrConfig, OcrEngineAdapter, OcrResult, TextBox};
#[cfg(feature = "imaging")]
pub use preprocess::{ImagePreprocessor, ImageVariant, VariantKind, VariantSet};
#[cfg(feature = "imaging")]
pub use scanner::{ReceiptScanner, ReceiptScannerBuilder};
