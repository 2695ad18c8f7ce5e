//! OCR engine abstraction and discovery.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::OcrError;
use crate::models::config::RcptConfig;
use crate::preprocess::ImageVariant;

use super::{OcrConfig, OcrResult};

/// How an engine treats recognition configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Honors page layout hints; runs once per configuration.
    Layout,
    /// Detects its own layout; runs once per variant.
    Neural,
}

/// An OCR back-end that turns one image variant into text.
pub trait OcrEngineAdapter: Send + Sync {
    /// Short engine name used in method labels.
    fn name(&self) -> &str;

    fn kind(&self) -> EngineKind;

    /// Recognize text. Implementations fill `text`, `confidence` and
    /// optionally `boxes`; the arbiter sets `method` and timing.
    fn recognize(&self, variant: &ImageVariant, config: &OcrConfig) -> Result<OcrResult, OcrError>;
}

/// Engines available in this environment.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngineAdapter>>,
}

impl EngineRegistry {
    pub fn new(engines: Vec<Arc<dyn OcrEngineAdapter>>) -> Self {
        Self { engines }
    }

    /// Probe every enabled engine once.
    ///
    /// Engines that cannot run are logged and left out; an empty registry
    /// is valid and makes every scan end in "no recognition".
    pub fn from_config(config: &RcptConfig) -> Self {
        #[allow(unused_mut)]
        let mut engines: Vec<Arc<dyn OcrEngineAdapter>> = Vec::new();

        #[cfg(feature = "tesseract")]
        if config.ocr.enable_tesseract {
            match super::TesseractAdapter::probe(&config.ocr) {
                Ok(adapter) => engines.push(Arc::new(adapter)),
                Err(e) => warn!("Tesseract disabled: {}", e),
            }
        }

        #[cfg(feature = "native")]
        if config.ocr.enable_neural {
            match super::NeuralAdapter::from_config(&config.models) {
                Ok(adapter) => engines.push(Arc::new(adapter)),
                Err(e) => warn!("Neural OCR disabled: {}", e),
            }
        }

        if engines.is_empty() {
            warn!("No OCR engine available");
        } else {
            info!(
                "OCR engines: {}",
                engines.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ")
            );
        }

        #[cfg(not(any(feature = "tesseract", feature = "native")))]
        let _ = config;

        Self { engines }
    }

    pub fn engines(&self) -> &[Arc<dyn OcrEngineAdapter>] {
        &self.engines
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
