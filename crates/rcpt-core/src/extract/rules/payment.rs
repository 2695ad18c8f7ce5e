//! Payment method detection.

use lazy_static::lazy_static;
use regex::Regex;

use super::{ExtractionMatch, FieldExtractor};
use crate::models::receipt::PaymentMethod;

lazy_static! {
    /// Keyword sets per method, checked in order.
    static ref PAYMENT_KEYWORDS: Vec<(PaymentMethod, Regex)> = vec![
        (PaymentMethod::Cash, keywords(&["cash"])),
        (
            PaymentMethod::Card,
            keywords(&["card", "credit card", "debit card", "visa", "mastercard", "rupay", "amex"]),
        ),
        (
            PaymentMethod::Upi,
            keywords(&["upi", "paytm", "gpay", "google pay", "phonepe", "bhim"]),
        ),
        (PaymentMethod::Wallet, keywords(&["wallet", "mobikwik", "amazon pay"])),
        (
            PaymentMethod::NetBanking,
            keywords(&["net banking", "netbanking", "online"]),
        ),
    ];
}

fn keywords(words: &[&str]) -> Regex {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s*"))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).unwrap()
}

/// Payment method extractor; the first category with a keyword hit wins.
#[derive(Default)]
pub struct PaymentMethodExtractor;

impl PaymentMethodExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for PaymentMethodExtractor {
    type Output = ExtractionMatch<PaymentMethod>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        PAYMENT_KEYWORDS
            .iter()
            .filter_map(|(method, pattern)| {
                let m = pattern.find(text)?;
                Some(ExtractionMatch::new(*method, 0.8, m.as_str()).with_position(m.start(), m.end()))
            })
            .collect()
    }
}
