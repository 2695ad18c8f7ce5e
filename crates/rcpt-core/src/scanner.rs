//! End-to-end receipt scanning: bytes in, [`ExtractedReceipt`] out.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::ScanError;
use crate::extract::ReceiptExtractor;
use crate::models::config::{RcptConfig, ScanMode};
use crate::models::receipt::ExtractedReceipt;
use crate::ocr::{EngineRegistry, OcrArbiter, OcrConfig, OcrEngineAdapter};
use crate::preprocess::{ImagePreprocessor, VariantSet};

/// Wires preprocessing, OCR arbitration and field extraction together.
///
/// Built once and shared; a scan holds no state between calls.
pub struct ReceiptScanner {
    preprocessor: ImagePreprocessor,
    arbiter: OcrArbiter,
    extractor: ReceiptExtractor,
    engines: Vec<Arc<dyn OcrEngineAdapter>>,
    configs: Vec<OcrConfig>,
    default_mode: ScanMode,
}

impl ReceiptScanner {
    /// Create a scanner, probing the engines enabled in `config`.
    pub fn new(config: RcptConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ReceiptScannerBuilder {
        ReceiptScannerBuilder::new()
    }

    /// Names of the engines this scanner runs.
    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn default_mode(&self) -> ScanMode {
        self.default_mode
    }

    /// Scan one receipt image.
    ///
    /// Only undecodable input is an error. When no OCR attempt produces text
    /// the receipt comes back with status `no_recognition_result`.
    pub fn scan(&self, bytes: &[u8], mode: ScanMode) -> Result<ExtractedReceipt, ScanError> {
        self.scan_with_variants(bytes, mode).map(|(receipt, _)| receipt)
    }

    /// Scan and also return the image variants that were fed to OCR.
    pub fn scan_with_variants(
        &self,
        bytes: &[u8],
        mode: ScanMode,
    ) -> Result<(ExtractedReceipt, VariantSet), ScanError> {
        let start = Instant::now();

        let image = self.preprocessor.load(bytes)?;
        let variants = self.preprocessor.produce_variants(&image, mode);

        let outcome = self.arbiter.run(&variants, &self.configs, &self.engines, mode);
        if outcome.best.is_failure() {
            warn!(
                "No text recognized after {} attempts ({} failed)",
                outcome.attempts, outcome.failures
            );
            return Ok((ExtractedReceipt::no_recognition(), variants));
        }

        let mut receipt = self.extractor.extract(&outcome.best.text);
        receipt.ocr_confidence = outcome.best.confidence;
        receipt.ocr_method = Some(outcome.best.method);

        info!(
            "Scanned receipt in {}ms: {} fields, score {:.2}",
            start.elapsed().as_millis(),
            receipt.populated_fields(),
            receipt.confidence_score
        );

        Ok((receipt, variants))
    }
}

/// Builder for [`ReceiptScanner`].
pub struct ReceiptScannerBuilder {
    config: RcptConfig,
    engines: Option<Vec<Arc<dyn OcrEngineAdapter>>>,
    configs: Vec<OcrConfig>,
    max_year: Option<i32>,
}

impl ReceiptScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: RcptConfig::default(),
            engines: None,
            configs: OcrConfig::catalog(),
            max_year: None,
        }
    }

    pub fn config(mut self, config: RcptConfig) -> Self {
        self.config = config;
        self
    }

    /// Use these engines instead of probing the environment.
    pub fn with_engines(mut self, engines: Vec<Arc<dyn OcrEngineAdapter>>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// Replace the recognition configuration catalog.
    pub fn with_configs(mut self, configs: Vec<OcrConfig>) -> Self {
        self.configs = configs;
        self
    }

    /// Pin the latest accepted purchase year.
    pub fn with_max_year(mut self, year: i32) -> Self {
        self.max_year = Some(year);
        self
    }

    pub fn build(self) -> ReceiptScanner {
        let engines = match self.engines {
            Some(engines) => engines,
            None => EngineRegistry::from_config(&self.config).engines().to_vec(),
        };

        let extractor = ReceiptExtractor::with_config(self.config.extraction.clone());
        let extractor = match self.max_year {
            Some(year) => extractor.with_max_year(year),
            None => extractor,
        };

        ReceiptScanner {
            preprocessor: ImagePreprocessor::with_config(self.config.preprocess.clone()),
            arbiter: OcrArbiter::from_config(&self.config.ocr),
            extractor,
            engines,
            configs: self.configs,
            default_mode: self.config.ocr.default_mode,
        }
    }
}

impl Default for ReceiptScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::models::receipt::ScanStatus;
    use crate::ocr::{EngineKind, OcrResult};
    use crate::preprocess::{ImageVariant, VariantKind};
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    struct Scripted {
        text: &'static str,
        confidence: f32,
    }

    impl OcrEngineAdapter for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn kind(&self) -> EngineKind {
            EngineKind::Neural
        }

        fn recognize(&self, variant: &ImageVariant, _config: &OcrConfig) -> Result<OcrResult, OcrError> {
            let confidence = if variant.kind == VariantKind::Standard {
                self.confidence
            } else {
                self.confidence / 2.0
            };
            Ok(OcrResult::new(self.text, confidence, ""))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([230])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn scanner(engines: Vec<Arc<dyn OcrEngineAdapter>>) -> ReceiptScanner {
        ReceiptScanner::builder()
            .with_engines(engines)
            .with_max_year(2030)
            .build()
    }

    #[test]
    fn test_scan_extracts_winning_text() {
        let engine: Arc<dyn OcrEngineAdapter> = Arc::new(Scripted {
            text: "CORNER STORE\n05/03/2024\nTOTAL: $31.39",
            confidence: 0.8,
        });
        let receipt = scanner(vec![engine]).scan(&png(200, 300), ScanMode::Fast).unwrap();

        assert_eq!(receipt.status, ScanStatus::Recognized);
        assert_eq!(receipt.total.map(|t| t.to_string()), Some("31.39".to_string()));
        assert_eq!(receipt.ocr_method.as_deref(), Some("scripted:auto:standard"));
        assert_eq!(receipt.ocr_confidence, 0.8);
        assert!(receipt.confidence_score > 0.0);
    }

    #[test]
    fn test_scan_without_engines_reports_no_recognition() {
        let receipt = scanner(Vec::new()).scan(&png(120, 160), ScanMode::Full).unwrap();
        assert_eq!(receipt, ExtractedReceipt::no_recognition());
    }

    #[test]
    fn test_scan_rejects_garbage() {
        let result = scanner(Vec::new()).scan(b"definitely not an image", ScanMode::Fast);
        assert!(matches!(result, Err(ScanError::UnreadableImage(_))));
    }

    #[test]
    fn test_scan_with_variants_returns_debug_images() {
        let engine: Arc<dyn OcrEngineAdapter> = Arc::new(Scripted {
            text: "TOTAL 9.99",
            confidence: 0.5,
        });
        let (_, variants) = scanner(vec![engine])
            .scan_with_variants(&png(200, 300), ScanMode::Fast)
            .unwrap();
        assert!(variants.get(VariantKind::Standard).is_some());
    }
}
