//! WASM bindings for receipt field extraction.
//!
//! OCR needs native engines, so the browser side hands over recognized text
//! and gets the structured receipt back.

use wasm_bindgen::prelude::*;

use rcpt_core::models::config::{ConfidenceWeights, ExtractionConfig};
use rcpt_core::ExtractedReceipt;

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Extract a receipt from OCR text with default settings.
#[wasm_bindgen]
pub fn extract_receipt_from_text(text: &str) -> Result<JsValue, JsValue> {
    to_js(&rcpt_core::ReceiptExtractor::new().extract(text))
}

/// Same as [`extract_receipt_from_text`], serialized as a JSON string.
#[wasm_bindgen]
pub fn extract_receipt_json(text: &str) -> Result<String, JsValue> {
    serde_json::to_string(&rcpt_core::ReceiptExtractor::new().extract(text))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse a receipt amount such as "₹1,234.50" or "12,50".
#[wasm_bindgen]
pub fn parse_amount(amount: &str) -> Option<f64> {
    rcpt_core::parse_amount(amount).and_then(|d| d.to_string().parse().ok())
}

/// Receipt extractor with adjustable scoring, for repeated use from JS.
#[wasm_bindgen]
pub struct ReceiptExtractor {
    config: ExtractionConfig,
    max_year: Option<i32>,
}

#[wasm_bindgen]
impl ReceiptExtractor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            config: ExtractionConfig::default(),
            max_year: None,
        }
    }

    /// Replace the confidence weights, e.g. `{ merchant: 30, total: 30 }`.
    ///
    /// Missing keys keep their default weight.
    #[wasm_bindgen(js_name = setWeights)]
    pub fn set_weights(&mut self, weights: JsValue) -> Result<(), JsValue> {
        self.config.weights = serde_wasm_bindgen::from_value::<ConfidenceWeights>(weights)
            .map_err(|e| JsValue::from_str(&format!("invalid weights: {}", e)))?;
        Ok(())
    }

    /// Current weights as a plain object.
    #[wasm_bindgen(js_name = getWeights)]
    pub fn get_weights(&self) -> Result<JsValue, JsValue> {
        to_js(&self.config.weights)
    }

    /// Latest purchase year accepted by the date parser.
    #[wasm_bindgen(js_name = setMaxYear)]
    pub fn set_max_year(&mut self, year: i32) {
        self.max_year = Some(year);
    }

    fn receipt(&self, text: &str) -> ExtractedReceipt {
        let extractor = rcpt_core::ReceiptExtractor::with_config(self.config.clone());
        match self.max_year {
            Some(year) => extractor.with_max_year(year).extract(text),
            None => extractor.extract(text),
        }
    }

    /// Extract a receipt from text.
    pub fn extract(&self, text: &str) -> Result<JsValue, JsValue> {
        to_js(&self.receipt(text))
    }

    /// Extract a receipt together with the list of fields worth reviewing.
    #[wasm_bindgen(js_name = extractWithIssues)]
    pub fn extract_with_issues(&self, text: &str) -> Result<JsValue, JsValue> {
        #[derive(serde::Serialize)]
        struct Checked {
            receipt: ExtractedReceipt,
            issues: Vec<String>,
        }

        let receipt = self.receipt(text);
        let issues = receipt.validate();
        to_js(&Checked { receipt, issues })
    }
}

impl Default for ReceiptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$31.39"), Some(31.39));
        assert_eq!(parse_amount("no amount"), None);
    }

    #[test]
    fn test_json_export() {
        let json = extract_receipt_json("CORNER STORE\nTOTAL: $31.39").unwrap();
        assert!(json.contains("\"total\":31.39"));
    }

    #[test]
    fn test_class_uses_pinned_year() {
        let mut extractor = ReceiptExtractor::new();
        extractor.set_max_year(2025);
        assert_eq!(extractor.receipt("Date: 31/12/2999\nTOTAL 5.00").date, None);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[wasm_bindgen_test]
    fn test_extract_receipt_from_text() {
        let value = extract_receipt_from_text("CORNER STORE\nMILK 2 1.50 3.00\nTOTAL: $3.00").unwrap();
        let receipt: serde_json::Value = serde_wasm_bindgen::from_value(value).unwrap();
        assert_eq!(receipt["total"].as_f64(), Some(3.0));
        assert_eq!(receipt["items"][0]["name"], serde_json::json!("Milk"));
    }

    #[wasm_bindgen_test]
    fn test_class_weights_round_trip() {
        let mut extractor = ReceiptExtractor::new();
        extractor.set_max_year(2025);
        let weights = extractor.get_weights().unwrap();
        extractor.set_weights(weights).unwrap();
        assert!(extractor.extract_with_issues("TOTAL: $31.39").is_ok());
        assert!(extractor.set_weights(JsValue::from_str("heavy")).is_err());
    }
}
