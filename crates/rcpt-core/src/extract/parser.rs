//! Receipt parser combining the rule-based field extractors.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::config::{ConfidenceWeights, ExtractionConfig};
use crate::models::receipt::ExtractedReceipt;

use super::rules::{
    derive_subtotal, normalize_text, DateExtractor, FieldExtractor, ItemExtractor,
    MerchantExtractor, PaymentMethodExtractor, ReceiptNumberExtractor, SubtotalExtractor,
    TaxExtractor, TotalExtractor,
};

/// Turns OCR text into an [`ExtractedReceipt`].
///
/// Extraction is a pure function of the text and the configuration; the only
/// outside input is the current year, read once per call to bound dates.
pub struct ReceiptExtractor {
    config: ExtractionConfig,
    max_year: Option<i32>,
}

impl ReceiptExtractor {
    /// Create an extractor with default thresholds and weights.
    pub fn new() -> Self {
        Self::with_config(ExtractionConfig::default())
    }

    /// Create an extractor from configuration.
    pub fn with_config(config: ExtractionConfig) -> Self {
        Self {
            config,
            max_year: None,
        }
    }

    /// Replace the confidence weights.
    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Pin the latest accepted purchase year instead of using next year.
    pub fn with_max_year(mut self, year: i32) -> Self {
        self.max_year = Some(year);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract every field from raw OCR text.
    pub fn extract(&self, text: &str) -> ExtractedReceipt {
        let normalized = normalize_text(text);
        let cfg = &self.config;
        let mut receipt = ExtractedReceipt::empty(text);

        receipt.merchant = MerchantExtractor::new()
            .with_header_lines(cfg.merchant_header_lines, cfg.merchant_fallback_lines)
            .extract(&normalized)
            .map(|m| m.value);

        let dates = match self.max_year {
            Some(year) => DateExtractor::new().with_max_year(year),
            None => DateExtractor::new(),
        };
        receipt.date = dates.extract(&normalized).map(|m| m.value);

        receipt.total = TotalExtractor::new()
            .with_max_amount(cfg.max_amount)
            .extract(&normalized)
            .map(|m| m.value);

        receipt.tax = TaxExtractor::new()
            .with_max_amount(cfg.max_amount)
            .extract(&normalized)
            .map(|m| m.value);

        receipt.subtotal = SubtotalExtractor::new()
            .with_max_amount(cfg.max_amount)
            .extract(&normalized)
            .map(|m| m.value);

        receipt.items = ItemExtractor::new()
            .with_max_item_price(cfg.max_item_price)
            .with_tolerance(cfg.item_tolerance_abs, cfg.item_tolerance_ratio)
            .extract_all(&normalized)
            .into_iter()
            .map(|m| m.value)
            .collect();

        receipt.receipt_number = ReceiptNumberExtractor::new()
            .extract(&normalized)
            .map(|m| m.value);

        receipt.payment_method = PaymentMethodExtractor::new()
            .extract(&normalized)
            .map(|m| m.value);

        self.cross_validate(&mut receipt);

        if receipt.subtotal.is_none() {
            receipt.subtotal = derive_subtotal(receipt.total, receipt.tax);
        }

        receipt.confidence_score = self.confidence(&receipt);

        info!(
            "Extracted {} fields, {} items, confidence {:.2}",
            receipt.populated_fields(),
            receipt.items.len(),
            receipt.confidence_score
        );

        receipt
    }

    /// Reconcile the total with the item sum and the subtotal plus tax.
    ///
    /// Only adjusts a total that was found; never fills in absent fields.
    fn cross_validate(&self, receipt: &mut ExtractedReceipt) {
        let Some(total) = receipt.total else {
            return;
        };

        if let Some(items_sum) = receipt.items_total() {
            if items_sum > Decimal::ZERO
                && (items_sum - total).abs() <= self.config.items_total_tolerance
                && items_sum != total
            {
                debug!("Total {} adjusted to item sum {}", total, items_sum);
                receipt.total = Some(items_sum);
            }
        }

        if let (Some(total), Some(subtotal), Some(tax)) = (receipt.total, receipt.subtotal, receipt.tax) {
            let computed = subtotal + tax;
            if (computed - total).abs() <= self.config.subtotal_tax_tolerance && computed != total {
                debug!("Total {} adjusted to subtotal + tax {}", total, computed);
                receipt.total = Some(computed);
            }
        }
    }

    /// Weighted share of populated fields, clamped to `[0, 1]`.
    fn confidence(&self, receipt: &ExtractedReceipt) -> f32 {
        let w = &self.config.weights;
        let mut score = 0.0;

        if receipt.merchant.is_some() {
            score += w.merchant;
        }
        if receipt.date.is_some() {
            score += w.date;
        }
        if receipt.total.is_some() {
            score += w.total;
        }
        if receipt.tax.is_some() {
            score += w.tax;
        }
        if !receipt.items.is_empty() {
            score += w.items;
            if receipt.items.len() > 1 {
                score += w.multiple_items_bonus;
            }
        }
        if receipt.receipt_number.is_some() {
            score += w.receipt_number;
        }
        if receipt.subtotal.is_some() {
            score += w.subtotal;
        }
        if receipt.payment_method.is_some() {
            score += w.payment_method;
        }

        (score / 100.0).clamp(0.0, 1.0)
    }
}

impl Default for ReceiptExtractor {
    fn default() -> Self {
        Self::new()
    }
}
