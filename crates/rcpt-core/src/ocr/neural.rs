//! Neural OCR adapter using `pure-onnx-ocr` (pure Rust, no ONNX Runtime).

use std::sync::Mutex;

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::ModelConfig;
use crate::preprocess::ImageVariant;

use super::engine::{EngineKind, OcrEngineAdapter};
use super::{sort_reading_order, OcrConfig, OcrResult, TextBox, DEFAULT_CONFIDENCE};

/// Detection + recognition network pair; layout hints do not apply.
///
/// Inference is serialized through a mutex.
pub struct NeuralAdapter {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
}

impl NeuralAdapter {
    /// Load the detection, recognition and dictionary files named in `models`.
    pub fn from_config(models: &ModelConfig) -> Result<Self, OcrError> {
        let det_path = models.model_dir.join(&models.detection_model);
        let rec_path = models.model_dir.join(&models.recognition_model);
        let dict_path = models.model_dir.join(&models.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.is_file() {
                return Err(OcrError::EngineUnavailable(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::EngineUnavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded neural OCR models from {}", models.model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl OcrEngineAdapter for NeuralAdapter {
    fn name(&self) -> &str {
        "neural"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Neural
    }

    fn recognize(&self, variant: &ImageVariant, _config: &OcrConfig) -> Result<OcrResult, OcrError> {
        let image = DynamicImage::ImageLuma8(variant.image.as_ref().clone());

        let engine = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("neural engine lock poisoned".to_string()))?;
        let results = engine
            .run_from_image(&image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions on {}", results.len(), variant.name());

        let mut boxes: Vec<TextBox> = results
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: r.text.replace("[UNK]", " ").trim().to_string(),
                confidence: r.confidence,
            })
            .collect();

        sort_reading_order(&mut boxes);

        let text = rows_to_text(&boxes);
        let confidence = if boxes.is_empty() {
            0.0
        } else {
            let mean = boxes.iter().map(|b| b.confidence).sum::<f32>() / boxes.len() as f32;
            if mean > 0.0 { mean } else { DEFAULT_CONFIDENCE }
        };

        Ok(OcrResult::new(text, confidence, self.name()).with_boxes(boxes))
    }
}

/// Join boxes on the same 20px row with spaces, rows with newlines.
fn rows_to_text(boxes: &[TextBox]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_row = None;

    for b in boxes {
        let (_, y, _, _) = b.rect();
        let row = (y / 20.0) as i32;
        match lines.last_mut() {
            Some(line) if current_row == Some(row) => {
                line.push(' ');
                line.push_str(&b.text);
            }
            _ => lines.push(b.text.clone()),
        }
        current_row = Some(row);
    }

    lines.join("\n")
}

/// Convert a `Polygon<f64>` to the `[f32; 8]` quadrilateral format.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
