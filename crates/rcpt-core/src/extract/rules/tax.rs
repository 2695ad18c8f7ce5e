//! Tax extraction: GST component breakdowns and labeled tax lines.

use rust_decimal::Decimal;
use tracing::debug;

use super::amounts::{amounts_in, is_plausible, parse_amount};
use super::patterns::{TAX_COMPONENT, TAX_LABELED, TAX_RATE};
use super::{ExtractionMatch, FieldExtractor};

/// Tax extractor.
///
/// Breakdown lines (CGST, SGST, IGST, UTGST, CESS) are summed. A component
/// segment runs from its keyword to the next keyword on the same line and
/// contributes its last amount once rate percentages are stripped. Lines
/// that also say "total" are only used when no plain breakdown exists, so
/// a "Total CGST" summary row is not counted twice.
pub struct TaxExtractor {
    max_amount: Decimal,
}

impl TaxExtractor {
    pub fn new() -> Self {
        Self {
            max_amount: Decimal::from(100_000),
        }
    }

    pub fn with_max_amount(mut self, max_amount: Decimal) -> Self {
        self.max_amount = max_amount;
        self
    }

    fn breakdown(&self, text: &str) -> Option<ExtractionMatch<Decimal>> {
        let mut plain: Vec<(Decimal, &str)> = Vec::new();
        let mut totals: Vec<(Decimal, &str)> = Vec::new();

        for line in text.lines() {
            let components = component_amounts(line)
                .into_iter()
                .filter(|a| is_plausible(*a, self.max_amount));
            let bucket = if line.to_lowercase().contains("total") {
                &mut totals
            } else {
                &mut plain
            };
            bucket.extend(components.map(|a| (a, line)));
        }

        let chosen = if plain.is_empty() { totals } else { plain };
        if chosen.is_empty() {
            return None;
        }

        let sum: Decimal = chosen.iter().map(|(a, _)| *a).sum();
        let mut sources: Vec<&str> = chosen.iter().map(|(_, l)| *l).collect();
        sources.dedup();
        Some(ExtractionMatch::new(sum, 0.9, sources.join("\n")))
    }

    fn labeled(&self, text: &str) -> Option<ExtractionMatch<Decimal>> {
        text.lines().rev().find_map(|line| {
            let caps = TAX_LABELED.captures(line)?;
            let amount = parse_amount(&caps[1]).filter(|a| is_plausible(*a, self.max_amount))?;
            Some(ExtractionMatch::new(amount, 0.8, line))
        })
    }
}

impl Default for TaxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TaxExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let result = self.breakdown(text).or_else(|| self.labeled(text));
        if result.is_none() {
            debug!("No tax found");
        }
        result
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.breakdown(text).into_iter().chain(self.labeled(text)).collect()
    }
}

/// Last amount of each tax component segment on a line.
fn component_amounts(line: &str) -> Vec<Decimal> {
    let starts: Vec<usize> = TAX_COMPONENT.find_iter(line).map(|m| m.end()).collect();
    let ends: Vec<usize> = TAX_COMPONENT
        .find_iter(line)
        .skip(1)
        .map(|m| m.start())
        .chain(std::iter::once(line.len()))
        .collect();

    starts
        .iter()
        .zip(ends.iter())
        .filter_map(|(&start, &end)| {
            let segment = TAX_RATE.replace_all(&line[start..end], " ");
            amounts_in(&segment).pop()
        })
        .collect()
}
