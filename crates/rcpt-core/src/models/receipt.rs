//! Receipt data model handed to storage and export collaborators.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured record recovered from one receipt scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReceipt {
    /// Store or chain name.
    pub merchant: Option<String>,

    /// Purchase date, serialized as `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,

    /// Amount paid; always positive when present.
    pub total: Option<Decimal>,

    /// Amount before tax.
    pub subtotal: Option<Decimal>,

    /// Total tax amount.
    pub tax: Option<Decimal>,

    /// Purchased items in the order they appear on the receipt.
    pub items: Vec<ItemLine>,

    /// Bill, invoice or transaction number.
    pub receipt_number: Option<String>,

    /// Payment category.
    pub payment_method: Option<PaymentMethod>,

    /// Share of the schema that was populated (0.0 - 1.0).
    pub confidence_score: f32,

    /// Verbatim winning OCR text.
    pub raw_text: String,

    /// Confidence reported by the OCR engine for `raw_text` (0.0 - 1.0).
    pub ocr_confidence: f32,

    /// Engine, configuration and variant that produced `raw_text`.
    pub ocr_method: Option<String>,

    /// Whether any OCR attempt produced text.
    pub status: ScanStatus,
}

/// Outcome marker separating "nothing recognized" from a weak result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// At least one OCR attempt produced text.
    #[default]
    Recognized,
    /// Every OCR attempt failed or returned empty text.
    NoRecognitionResult,
}

/// A purchased item line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLine {
    /// Item name, trimmed and title-cased.
    pub name: String,

    /// Quantity bought (> 0, defaults to 1).
    pub quantity: Decimal,

    /// Price per unit.
    pub unit_price: Decimal,

    /// Line total.
    pub total_price: Decimal,
}

/// Payment categories recognized on receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Wallet,
    NetBanking,
}

impl PaymentMethod {
    /// Wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::NetBanking => "net_banking",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ItemLine {
    /// Create an item line.
    pub fn new(name: impl Into<String>, quantity: Decimal, unit_price: Decimal, total_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            total_price,
        }
    }

    /// Create a single-unit item from its line total.
    pub fn single(name: impl Into<String>, total_price: Decimal) -> Self {
        Self::new(name, Decimal::ONE, total_price, total_price)
    }

    /// Check `quantity * unit_price` against the line total.
    ///
    /// The window is the larger of `abs` and `ratio * total_price`. Products
    /// too large for a `Decimal` are never consistent.
    pub fn is_consistent(&self, abs: Decimal, ratio: Decimal) -> bool {
        let Some(tolerance) = self.total_price.checked_mul(ratio).map(|t| abs.max(t)) else {
            return false;
        };
        self.quantity
            .checked_mul(self.unit_price)
            .and_then(|product| product.checked_sub(self.total_price))
            .is_some_and(|diff| diff.abs() <= tolerance)
    }
}

impl ExtractedReceipt {
    /// Create a receipt with no fields populated.
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            merchant: None,
            date: None,
            total: None,
            subtotal: None,
            tax: None,
            items: Vec::new(),
            receipt_number: None,
            payment_method: None,
            confidence_score: 0.0,
            raw_text: raw_text.into(),
            ocr_confidence: 0.0,
            ocr_method: None,
            status: ScanStatus::Recognized,
        }
    }

    /// Terminal record for a scan where no OCR attempt produced text.
    pub fn no_recognition() -> Self {
        Self {
            status: ScanStatus::NoRecognitionResult,
            ..Self::empty("")
        }
    }

    /// Number of populated schema fields.
    pub fn populated_fields(&self) -> usize {
        [
            self.merchant.is_some(),
            self.date.is_some(),
            self.total.is_some(),
            self.subtotal.is_some(),
            self.tax.is_some(),
            !self.items.is_empty(),
            self.receipt_number.is_some(),
            self.payment_method.is_some(),
        ]
        .iter()
        .filter(|populated| **populated)
        .count()
    }

    /// Sum of item line totals, if any items were recovered.
    pub fn items_total(&self) -> Option<Decimal> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.iter().map(|i| i.total_price).sum())
        }
    }

    /// List the gaps a reviewer should look at before trusting the record.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.status == ScanStatus::NoRecognitionResult {
            issues.push("No text was recognized; rescan the receipt".to_string());
            return issues;
        }

        if self.merchant.is_none() {
            issues.push("Missing merchant".to_string());
        }

        if self.date.is_none() {
            issues.push("Missing date".to_string());
        }

        if self.total.is_none() {
            issues.push("Missing total".to_string());
        }

        if let (Some(total), Some(items_total)) = (self.total, self.items_total()) {
            if items_total > total {
                issues.push(format!(
                    "Item lines sum to {} which exceeds the total {}",
                    items_total.round_dp(2),
                    total.round_dp(2)
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_serialized_field_names() {
        let mut receipt = ExtractedReceipt::empty("TOTAL 10.00");
        receipt.total = Some(Decimal::from_str("10.00").unwrap());
        receipt.payment_method = Some(PaymentMethod::NetBanking);
        receipt.date = NaiveDate::from_ymd_opt(2024, 3, 9);

        let json = serde_json::to_value(&receipt).unwrap();

        for key in [
            "merchant",
            "date",
            "total",
            "subtotal",
            "tax",
            "items",
            "receiptNumber",
            "paymentMethod",
            "confidenceScore",
            "rawText",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(json["paymentMethod"], "net_banking");
        assert_eq!(json["date"], "2024-03-09");
        assert_eq!(json["total"].as_f64(), Some(10.0));
        assert_eq!(json["status"], "recognized");
    }

    #[test]
    fn test_item_consistency_window() {
        let item = ItemLine::new(
            "Lijjat Papad",
            Decimal::from(2),
            Decimal::from_str("42.00").unwrap(),
            Decimal::from_str("84.00").unwrap(),
        );
        assert!(item.is_consistent(Decimal::ONE, Decimal::new(10, 2)));

        let misparse = ItemLine::new(
            "Lijjat Papad",
            Decimal::from(20),
            Decimal::from_str("42.00").unwrap(),
            Decimal::from_str("84.00").unwrap(),
        );
        assert!(!misparse.is_consistent(Decimal::ONE, Decimal::new(10, 2)));
    }

    #[test]
    fn test_item_consistency_overflow() {
        let huge = Decimal::MAX;
        let item = ItemLine::new("Widget", huge, huge, Decimal::ONE);
        assert!(!item.is_consistent(Decimal::ONE, Decimal::new(10, 2)));
    }

    #[test]
    fn test_no_recognition_record() {
        let receipt = ExtractedReceipt::no_recognition();
        assert_eq!(receipt.status, ScanStatus::NoRecognitionResult);
        assert_eq!(receipt.populated_fields(), 0);
        assert_eq!(receipt.confidence_score, 0.0);
        assert!(receipt.raw_text.is_empty());
        assert_eq!(receipt.validate().len(), 1);
    }
}
