//! Amount extraction for receipts: totals, subtotals and the shared parser.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::patterns::{
    AMOUNT_TOKEN, CONTACT, DATE_DMY, DATE_YMD, NOT_TOTAL, PRICED_AMOUNT, SUBTOTAL, TAX_COMPONENT,
    TAX_LABELED, TOTAL_BALANCE, TOTAL_CURRENCY_TRAILING, TOTAL_DUE, TOTAL_GRAND, TOTAL_PLAIN,
    TOTAL_YOU_PAY,
};
use super::{ExtractionMatch, FieldExtractor};

/// Total extractor.
///
/// Tiers are tried in priority order; within a tier lines are searched from
/// the bottom of the receipt upwards. When no labeled tier matches, the last
/// few lines are searched for an unlabeled priced amount.
pub struct TotalExtractor {
    max_amount: Decimal,
}

impl TotalExtractor {
    pub fn new() -> Self {
        Self {
            max_amount: Decimal::from(100_000),
        }
    }

    /// Set the largest plausible total.
    pub fn with_max_amount(mut self, max_amount: Decimal) -> Self {
        self.max_amount = max_amount;
        self
    }

    fn tiers() -> [(&'static Regex, f32, bool); 6] {
        // (pattern, confidence, skip lines that name another amount)
        [
            (&*TOTAL_GRAND, 0.95, false),
            (&*TOTAL_DUE, 0.9, false),
            (&*TOTAL_PLAIN, 0.85, true),
            (&*TOTAL_BALANCE, 0.7, true),
            (&*TOTAL_YOU_PAY, 0.7, false),
            (&*TOTAL_CURRENCY_TRAILING, 0.5, true),
        ]
    }

    /// Rightmost priced amount of at least [`FALLBACK_MIN_TOTAL`] on the
    /// bottom lines, skipping lines that name another kind of amount.
    fn unlabeled(&self, lines: &[&str]) -> Option<ExtractionMatch<Decimal>> {
        let start = lines.len().saturating_sub(FALLBACK_LINES);
        lines[start..].iter().rev().find_map(|line| {
            if NOT_TOTAL.is_match(line)
                || TAX_COMPONENT.is_match(line)
                || TAX_LABELED.is_match(line)
                || CONTACT.is_match(line)
                || DATE_DMY.is_match(line)
                || DATE_YMD.is_match(line)
            {
                return None;
            }
            PRICED_AMOUNT
                .find_iter(line)
                .filter_map(|m| parse_amount(m.as_str()))
                .filter(|amount| *amount >= FALLBACK_MIN_TOTAL && *amount <= self.max_amount)
                .last()
                .map(|amount| ExtractionMatch::new(amount, 0.3, *line))
        })
    }
}

/// Number of trailing lines searched for an unlabeled total.
const FALLBACK_LINES: usize = 10;

/// Smallest unlabeled amount taken as a total.
const FALLBACK_MIN_TOTAL: Decimal = Decimal::TEN;

impl Default for TotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TotalExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// All candidate totals, best first.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let lines: Vec<&str> = text.lines().collect();
        let mut results = Vec::new();

        for (pattern, confidence, skip_other_amounts) in Self::tiers() {
            for line in lines.iter().rev() {
                if skip_other_amounts && (NOT_TOTAL.is_match(line) || TAX_COMPONENT.is_match(line)) {
                    continue;
                }
                let Some(caps) = pattern.captures(line) else {
                    continue;
                };
                match parse_amount(&caps[1]) {
                    Some(amount) if is_plausible(amount, self.max_amount) => {
                        results.push(ExtractionMatch::new(amount, confidence, *line));
                    }
                    _ => debug!("Discarded implausible total in line: {}", line),
                }
            }
        }

        if results.is_empty() {
            results.extend(self.unlabeled(&lines));
        }

        results
    }
}

/// Subtotal extractor for explicitly labeled subtotals.
pub struct SubtotalExtractor {
    max_amount: Decimal,
}

impl SubtotalExtractor {
    pub fn new() -> Self {
        Self {
            max_amount: Decimal::from(100_000),
        }
    }

    pub fn with_max_amount(mut self, max_amount: Decimal) -> Self {
        self.max_amount = max_amount;
        self
    }
}

impl Default for SubtotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for SubtotalExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines()
            .filter_map(|line| {
                let caps = SUBTOTAL.captures(line)?;
                let amount = parse_amount(&caps[1])?;
                is_plausible(amount, self.max_amount)
                    .then(|| ExtractionMatch::new(amount, 0.9, line))
            })
            .collect()
    }
}

/// Derive a subtotal from the total and tax when no label was found.
pub fn derive_subtotal(total: Option<Decimal>, tax: Option<Decimal>) -> Option<Decimal> {
    match (total, tax) {
        (Some(total), Some(tax)) if total > tax => Some(total - tax),
        _ => None,
    }
}

/// Check an amount lies in `(0, max]`.
pub fn is_plausible(amount: Decimal, max: Decimal) -> bool {
    amount > Decimal::ZERO && amount <= max
}

/// All amount tokens on a line, left to right.
pub fn amounts_in(line: &str) -> Vec<Decimal> {
    AMOUNT_TOKEN
        .find_iter(line)
        .filter_map(|m| parse_amount(m.as_str()))
        .collect()
}

/// Parse a receipt amount (e.g. "₹1,095.85", "Rs. 155,00", "1.234,56").
///
/// Currency markers are stripped. The last of `.`/`,` is the decimal
/// separator when both appear; a lone separator followed by exactly three
/// digits is read as thousands grouping.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');

    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => single_separator(cleaned, ','),
        (None, Some(_)) => single_separator(cleaned, '.'),
        (None, None) => cleaned.to_string(),
    };

    Decimal::from_str(&normalized).ok()
}

fn single_separator(s: &str, sep: char) -> String {
    let groups: Vec<&str> = s.split(sep).collect();
    let last = groups.last().map(|g| g.len()).unwrap_or(0);

    if groups.len() > 2 || last == 3 {
        // Thousands grouping only
        groups.concat()
    } else {
        let (head, tail) = groups.split_at(groups.len() - 1);
        format!("{}.{}", head.concat(), tail.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$31.39"), Some(dec("31.39")));
        assert_eq!(parse_amount("₹1,095.85"), Some(dec("1095.85")));
        assert_eq!(parse_amount("Rs. 155,00"), Some(dec("155.00")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1,00,000.00"), Some(dec("100000.00")));
        assert_eq!(parse_amount("1,095"), Some(dec("1095")));
        assert_eq!(parse_amount("Rs."), None);
    }

    #[test]
    fn test_total_dollar_label() {
        let text = "WALMART\nSUBTOTAL: $29.00\nTAX: $2.39\nTOTAL: $31.39\nCASH $40.00\nCHANGE $8.61";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("31.39"));
    }

    #[test]
    fn test_grand_total_beats_plain_total() {
        let text = "Total 100.00\nCGST @9% 9.00\nSGST @9% 9.00\nGrand Total: Rs. 118.00\nTotal Savings 12.00";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("118.00"));
    }

    #[test]
    fn test_total_searched_from_bottom() {
        let text = "Total 40.00\nitems...\nTotal 55.00";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("55.00"));
    }

    #[test]
    fn test_total_rejects_absurd_amounts() {
        let text = "TOTAL: 9999999.00\nBalance Due 250.00";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("250.00"));

        assert!(TotalExtractor::new().extract("TOTAL: 0.00").is_none());
    }

    #[test]
    fn test_currency_trailing_fallback() {
        let text = "Thank you\nPaid by card ₹ 499.00";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("499.00"));
    }

    #[test]
    fn test_unlabeled_total_near_bottom() {
        let text = "CORNER STORE\nRice 50.00\nGrand 49.05";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("49.05"));
        assert!((total.confidence - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unlabeled_total_skips_other_amounts() {
        let text = "CORNER STORE\nRice 2 25.00 50.00\nCGST @9% 4.50\nCash 100.00\nDate 05/03/2024";
        let total = TotalExtractor::new().extract(text).unwrap();
        assert_eq!(total.value, dec("50.00"));

        let far = format!("Rice 50.00\n{}", "thank you\n".repeat(10));
        assert!(TotalExtractor::new().extract(&far).is_none());
        assert!(TotalExtractor::new().extract("Tea 5.00\nBun 4.00").is_none());
    }

    #[test]
    fn test_subtotal_label_and_derivation() {
        let sub = SubtotalExtractor::new().extract("Sub Total : 150.00\nTotal 177.00").unwrap();
        assert_eq!(sub.value, dec("150.00"));

        assert_eq!(derive_subtotal(Some(dec("177.00")), Some(dec("27.00"))), Some(dec("150.00")));
        assert_eq!(derive_subtotal(Some(dec("177.00")), None), None);
    }

    #[test]
    fn test_amounts_in_line() {
        assert_eq!(
            amounts_in("LIJJAT PAPAD 2 42.00 84.00"),
            vec![dec("2"), dec("42.00"), dec("84.00")]
        );
    }
}
