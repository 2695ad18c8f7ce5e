//! Configuration structures for the scanning pipeline.

use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Image preprocessing configuration.
    pub preprocess: PreprocessConfig,

    /// OCR engine configuration.
    pub ocr: EngineConfig,

    /// Receipt field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Neural OCR model files.
    pub models: ModelConfig,
}

/// How many OCR attempts a scan makes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Every variant against every OCR configuration.
    #[default]
    Full,
    /// Two variants, one configuration, one neural pass.
    Fast,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "fast" => Ok(Self::Fast),
            other => Err(format!("unknown scan mode: {}", other)),
        }
    }
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Maximum image dimension (longer side) kept after decoding.
    pub max_dimension: u32,

    /// Width the `standard` variant is bounded to.
    pub standard_width: u32,

    /// Fraction of height dropped from the top edge.
    pub crop_top: f32,

    /// Fraction of height dropped from the bottom edge.
    pub crop_bottom: f32,

    /// Fraction of width dropped from the left edge.
    pub crop_left: f32,

    /// Fraction of width dropped from the right edge.
    pub crop_right: f32,

    /// Smallest side (pixels) a cropped image may have before the crop is skipped.
    pub min_crop_dimension: u32,

    /// Try to detect and unwarp the receipt outline.
    pub detect_perspective: bool,

    /// Smallest quadrilateral area, as a fraction of the image, accepted as a receipt outline.
    pub min_quad_area_ratio: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            standard_width: 1200,
            crop_top: 0.05,
            crop_bottom: 0.05,
            crop_left: 0.10,
            crop_right: 0.10,
            min_crop_dimension: 32,
            detect_perspective: true,
            min_quad_area_ratio: 0.1,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Use the Tesseract engine when it is installed.
    pub enable_tesseract: bool,

    /// Use the neural ONNX engine when its models are present.
    pub enable_neural: bool,

    /// Tesseract language code(s), e.g. "eng" or "eng+hin".
    pub language: String,

    /// DPI hint passed to Tesseract.
    pub dpi: Option<i32>,

    /// Tesseract OCR engine mode.
    pub oem: Option<i32>,

    /// Per-attempt time budget in seconds (0 disables the timeout).
    pub attempt_timeout_secs: u64,

    /// Mode used when the caller does not pick one.
    pub default_mode: ScanMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_tesseract: true,
            enable_neural: true,
            language: "eng".to_string(),
            dpi: Some(300),
            oem: Some(1),
            attempt_timeout_secs: 120,
            default_mode: ScanMode::Full,
        }
    }
}

/// Receipt field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Largest amount accepted as a total, tax or subtotal.
    pub max_amount: Decimal,

    /// Largest price accepted for a single item line.
    pub max_item_price: Decimal,

    /// Items-sum agreement window for replacing the total.
    pub items_total_tolerance: Decimal,

    /// Subtotal-plus-tax agreement window for replacing the total.
    pub subtotal_tax_tolerance: Decimal,

    /// Absolute floor of the quantity × unit price tolerance.
    pub item_tolerance_abs: Decimal,

    /// Relative part of the quantity × unit price tolerance.
    pub item_tolerance_ratio: Decimal,

    /// Lines from the top searched for the merchant name.
    pub merchant_header_lines: usize,

    /// Lines from the top used for the first-plain-line merchant fallback.
    pub merchant_fallback_lines: usize,

    /// Weights of the field-population confidence score.
    pub weights: ConfidenceWeights,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_amount: Decimal::from(100_000),
            max_item_price: Decimal::from(100_000),
            items_total_tolerance: Decimal::from(5),
            subtotal_tax_tolerance: Decimal::from(2),
            item_tolerance_abs: Decimal::ONE,
            item_tolerance_ratio: Decimal::new(10, 2),
            merchant_header_lines: 10,
            merchant_fallback_lines: 8,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// Points awarded per populated field; the score is their sum over 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub merchant: f32,
    pub date: f32,
    pub total: f32,
    pub tax: f32,
    pub items: f32,
    /// Extra points when more than one item was recovered.
    pub multiple_items_bonus: f32,
    pub receipt_number: f32,
    pub subtotal: f32,
    pub payment_method: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            merchant: 20.0,
            date: 15.0,
            total: 25.0,
            tax: 10.0,
            items: 15.0,
            multiple_items_bonus: 5.0,
            receipt_number: 5.0,
            subtotal: 3.0,
            payment_method: 2.0,
        }
    }
}

/// Neural OCR model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "rec.onnx".to_string(),
            dictionary: "dict.txt".to_string(),
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}
