//! OCR engines, configurations and the attempt arbiter.

mod arbiter;
mod engine;
#[cfg(feature = "native")]
mod neural;
#[cfg(feature = "tesseract")]
mod tesseract;

pub use arbiter::{Attempt, ArbiterOutcome, OcrArbiter};
pub use engine::{EngineKind, EngineRegistry, OcrEngineAdapter};
#[cfg(feature = "native")]
pub use neural::NeuralAdapter;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractAdapter;

use serde::{Deserialize, Serialize};

/// Confidence reported when an engine returns text without any scores.
pub const DEFAULT_CONFIDENCE: f32 = 0.3;

/// A recognized text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Quadrilateral (x1, y1, x2, y2, x3, y3, x4, y4).
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Axis-aligned bounding rectangle as (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of one OCR attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Full recognized text, one line per row.
    pub text: String,

    /// Normalized recognition certainty (0.0 - 1.0).
    pub confidence: f32,

    /// `engine:config:variant` label of the attempt.
    pub method: String,

    /// Recognized regions, when the engine reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boxes: Vec<TextBox>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, confidence: f32, method: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            method: method.into(),
            boxes: Vec::new(),
            processing_time_ms: 0,
        }
    }

    pub fn with_boxes(mut self, boxes: Vec<TextBox>) -> Self {
        self.boxes = boxes;
        self
    }

    /// Sentinel for "no attempt produced text".
    pub fn failed() -> Self {
        Self::new("", 0.0, "none")
    }

    pub fn is_failure(&self) -> bool {
        self.method == "none" && self.text.is_empty()
    }
}

/// Sort boxes top-to-bottom, then left-to-right within 20px rows.
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();
        let row_a = (ay / 20.0) as i32;
        let row_b = (by / 20.0) as i32;

        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

/// Page layout hint, mapped to a Tesseract page segmentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    UniformBlock,
    SingleColumn,
    SparseText,
    SingleWord,
}

impl PageLayout {
    pub fn psm(&self) -> i32 {
        match self {
            PageLayout::SingleColumn => 4,
            PageLayout::UniformBlock => 6,
            PageLayout::SingleWord => 8,
            PageLayout::SparseText => 11,
        }
    }
}

/// Named recognition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    pub name: String,
    pub layout: PageLayout,
    /// Characters the engine may emit; `None` allows everything.
    pub char_whitelist: Option<String>,
    pub preserve_interword_spaces: bool,
}

impl OcrConfig {
    pub const RECEIPT_OPTIMIZED: &'static str = "receipt_optimized";

    pub fn new(name: impl Into<String>, layout: PageLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            char_whitelist: None,
            preserve_interword_spaces: false,
        }
    }

    pub fn with_whitelist(mut self, chars: impl Into<String>) -> Self {
        self.char_whitelist = Some(chars.into());
        self
    }

    pub fn with_preserved_spaces(mut self) -> Self {
        self.preserve_interword_spaces = true;
        self
    }

    /// The configuration used in fast mode.
    pub fn receipt_optimized() -> Self {
        Self::new(Self::RECEIPT_OPTIMIZED, PageLayout::UniformBlock).with_preserved_spaces()
    }

    /// Built-in configurations, in attempt order.
    pub fn catalog() -> Vec<OcrConfig> {
        vec![
            Self::new("default", PageLayout::UniformBlock).with_preserved_spaces(),
            Self::new("single_column", PageLayout::SingleColumn),
            Self::new("sparse_text", PageLayout::SparseText),
            Self::new("single_word", PageLayout::SingleWord),
            Self::new("digits_only", PageLayout::UniformBlock).with_whitelist("0123456789.,"),
            Self::receipt_optimized(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(text: &str, x: f32, y: f32) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_failed_sentinel() {
        assert!(OcrResult::failed().is_failure());
        assert!(!OcrResult::new("TOTAL 1.00", 0.0, "none:x:y").is_failure());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(OcrResult::new("a", 1.7, "m").confidence, 1.0);
    }

    #[test]
    fn test_reading_order() {
        let mut boxes = vec![
            text_box("31.39", 200.0, 42.0),
            text_box("STORE", 10.0, 2.0),
            text_box("TOTAL", 10.0, 45.0),
        ];
        sort_reading_order(&mut boxes);
        let texts: Vec<&str> = boxes.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["STORE", "TOTAL", "31.39"]);
    }

    #[test]
    fn test_catalog_names_and_modes() {
        let names: Vec<String> = OcrConfig::catalog().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec!["default", "single_column", "sparse_text", "single_word", "digits_only", "receipt_optimized"]
        );
        assert_eq!(PageLayout::SparseText.psm(), 11);
    }
}
