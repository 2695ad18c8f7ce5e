//! Tesseract adapter using `rusty-tesseract`.

use std::collections::{BTreeMap, HashMap};

use rusty_tesseract::{Args, Image};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::EngineConfig;
use crate::preprocess::ImageVariant;

use super::engine::{EngineKind, OcrEngineAdapter};
use super::{OcrConfig, OcrResult, DEFAULT_CONFIDENCE};

/// Layout-aware engine backed by the `tesseract` binary.
pub struct TesseractAdapter {
    language: String,
    dpi: Option<i32>,
    oem: Option<i32>,
}

impl TesseractAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            language: config.language.clone(),
            dpi: config.dpi,
            oem: config.oem,
        }
    }

    /// Create an adapter if the tesseract binary can be run.
    pub fn probe(config: &EngineConfig) -> Result<Self, OcrError> {
        let version = rusty_tesseract::get_tesseract_version()
            .map_err(|e| OcrError::EngineUnavailable(format!("tesseract: {}", e)))?;
        debug!("Found tesseract {}", version.lines().next().unwrap_or_default());
        Ok(Self::new(config))
    }

    fn args(&self, config: &OcrConfig) -> Args {
        let mut variables = HashMap::new();
        if let Some(whitelist) = &config.char_whitelist {
            variables.insert("tessedit_char_whitelist".to_string(), whitelist.clone());
        }
        if config.preserve_interword_spaces {
            variables.insert("preserve_interword_spaces".to_string(), "1".to_string());
        }

        Args {
            lang: self.language.clone(),
            config_variables: variables,
            dpi: self.dpi,
            psm: Some(config.layout.psm()),
            oem: self.oem,
        }
    }
}

impl OcrEngineAdapter for TesseractAdapter {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Layout
    }

    fn recognize(&self, variant: &ImageVariant, config: &OcrConfig) -> Result<OcrResult, OcrError> {
        // Staged through a PNG so the binary reads the exact variant pixels
        let staged = tempfile::Builder::new()
            .prefix("rcpt-")
            .suffix(".png")
            .tempfile()?;
        variant
            .image
            .save_with_format(staged.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        let image = Image::from_path(staged.path())
            .map_err(|e| OcrError::InvalidImage(format!("tesseract: {}", e)))?;
        let data = rusty_tesseract::image_to_data(&image, &self.args(config))
            .map_err(|e| OcrError::Recognition(format!("tesseract: {}", e)))?;

        // Rebuild lines keyed by (block, paragraph, line)
        let mut lines: BTreeMap<(i32, i32, i32), Vec<String>> = BTreeMap::new();
        let mut scores = Vec::new();
        for word in &data.data {
            let text = word.text.trim();
            if text.is_empty() {
                continue;
            }
            lines
                .entry((word.block_num, word.par_num, word.line_num))
                .or_default()
                .push(text.to_string());
            if word.conf > 0.0 {
                scores.push(word.conf);
            }
        }

        let text = lines
            .values()
            .map(|words| words.join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = if !scores.is_empty() {
            scores.iter().sum::<f32>() / scores.len() as f32 / 100.0
        } else if !text.is_empty() {
            DEFAULT_CONFIDENCE
        } else {
            0.0
        };

        debug!(
            "tesseract {} on {}: {} lines, confidence {:.2}",
            config.name,
            variant.name(),
            lines.len(),
            confidence
        );

        Ok(OcrResult::new(text, confidence, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::PageLayout;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_follow_config() {
        let adapter = TesseractAdapter::new(&EngineConfig::default());

        let args = adapter.args(&OcrConfig::new("digits", PageLayout::UniformBlock).with_whitelist("0123456789.,"));
        assert_eq!(args.psm, Some(6));
        assert_eq!(args.lang, "eng");
        assert_eq!(
            args.config_variables.get("tessedit_char_whitelist").map(String::as_str),
            Some("0123456789.,")
        );

        let args = adapter.args(&OcrConfig::receipt_optimized());
        assert_eq!(
            args.config_variables.get("preserve_interword_spaces").map(String::as_str),
            Some("1")
        );
        assert_eq!(adapter.args(&OcrConfig::new("sparse", PageLayout::SparseText)).psm, Some(11));
    }
}
