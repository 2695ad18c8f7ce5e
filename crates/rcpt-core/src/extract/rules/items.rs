//! Line item extraction.
//!
//! Item rows are recognized by an ordered table of [`ItemLineMatcher`]s. When
//! the receipt has a recognizable item table (a header row followed by rows
//! up to the first total), only that section is parsed; otherwise every line
//! outside the deny list is tried.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::debug;

use super::amounts::parse_amount;
use super::patterns::{
    AMOUNT, CURRENCY, LEADING_SERIAL, NON_ITEM, NUMERIC_ONLY, SECTION_END, SECTION_NON_ITEM, SERIAL_HEADER,
};
use super::{ExtractionMatch, FieldExtractor};
use crate::models::receipt::ItemLine;

const QTY: &str = r"\d+(?:\.\d{1,3})?";

lazy_static! {
    static ref CODE_NAME_QTY_RATE_AMOUNT: Regex = Regex::new(&format!(
        r"^(\d{{3,14}})\s+(.+?)\s+({QTY})\s+{CURRENCY}?\s*({AMOUNT})\s+{CURRENCY}?\s*({AMOUNT})$"
    ))
    .unwrap();

    static ref NAME_QTY_RATE_AMOUNT: Regex = Regex::new(&format!(
        r"(?i)^(.+?)\s+({QTY})\s+{CURRENCY}?\s*({AMOUNT})\s+{CURRENCY}?\s*({AMOUNT})$"
    ))
    .unwrap();

    static ref NAME_QTY_AT_PRICE: Regex = Regex::new(&format!(
        r"(?i)^(.+?)\s+({QTY})\s*(?:x|@|\*)\s*{CURRENCY}?\s*({AMOUNT})(?:\s+{CURRENCY}?\s*({AMOUNT}))?$"
    ))
    .unwrap();

    static ref NAME_AMOUNT: Regex = Regex::new(&format!(
        r"(?i)^(.+?)\s+{CURRENCY}?\s*(\d{{1,3}}(?:,\d{{2,3}})*[.,]\d{{2}}|\d+[.,]\d{{2}})$"
    ))
    .unwrap();

    static ref PRICE_LIKE: Regex = Regex::new(r"\d[.,]\d{2}\b").unwrap();

    static ref HEADER_WORD: Regex = Regex::new(
        r"(?i)\b(items?|description|qty|price|amount|particulars|hsn|rate)\b"
    ).unwrap();
}

/// One recognized item row shape. Matchers are tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLineMatcher {
    /// `8901234567890 SAFAL PEAS 1 155.00 155.00`
    CodeNameQtyRateAmount,
    /// `SAFAL PEAS 1 155.00 155.00`
    NameQtyRateAmount,
    /// `MILK 2 x 3.99` or `MILK 2 @ 3.99 7.98`
    NameQtyAtPrice,
    /// `BREAD 45.00`
    NameAmount,
}

impl ItemLineMatcher {
    pub const ALL: [ItemLineMatcher; 4] = [
        ItemLineMatcher::CodeNameQtyRateAmount,
        ItemLineMatcher::NameQtyRateAmount,
        ItemLineMatcher::NameQtyAtPrice,
        ItemLineMatcher::NameAmount,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            ItemLineMatcher::CodeNameQtyRateAmount => &CODE_NAME_QTY_RATE_AMOUNT,
            ItemLineMatcher::NameQtyRateAmount => &NAME_QTY_RATE_AMOUNT,
            ItemLineMatcher::NameQtyAtPrice => &NAME_QTY_AT_PRICE,
            ItemLineMatcher::NameAmount => &NAME_AMOUNT,
        }
    }

    /// Parse a line into an unvalidated item.
    pub fn try_match(self, line: &str) -> Option<ItemLine> {
        let caps = self.pattern().captures(line)?;
        match self {
            ItemLineMatcher::CodeNameQtyRateAmount => qty_rate_amount(&caps, 2),
            ItemLineMatcher::NameQtyRateAmount => qty_rate_amount(&caps, 1),
            ItemLineMatcher::NameQtyAtPrice => {
                let quantity = parse_amount(&caps[2])?;
                let unit_price = parse_amount(&caps[3])?;
                let total_price = match caps.get(4) {
                    Some(m) => parse_amount(m.as_str())?,
                    None => quantity.checked_mul(unit_price)?.round_dp(2),
                };
                Some(ItemLine::new(clean_name(&caps[1])?, quantity, unit_price, total_price))
            }
            ItemLineMatcher::NameAmount => {
                // A price left in the name means a richer row failed validation
                if PRICE_LIKE.is_match(&caps[1]) {
                    return None;
                }
                let total_price = parse_amount(&caps[2])?;
                Some(ItemLine::single(clean_name(&caps[1])?, total_price))
            }
        }
    }
}

fn qty_rate_amount(caps: &Captures<'_>, name: usize) -> Option<ItemLine> {
    Some(ItemLine::new(
        clean_name(&caps[name])?,
        parse_amount(&caps[name + 1])?,
        parse_amount(&caps[name + 2])?,
        parse_amount(&caps[name + 3])?,
    ))
}

/// Line item extractor.
pub struct ItemExtractor {
    max_item_price: Decimal,
    tolerance_abs: Decimal,
    tolerance_ratio: Decimal,
}

impl ItemExtractor {
    pub fn new() -> Self {
        Self {
            max_item_price: Decimal::from(100_000),
            tolerance_abs: Decimal::ONE,
            tolerance_ratio: Decimal::new(10, 2),
        }
    }

    pub fn with_max_item_price(mut self, max_item_price: Decimal) -> Self {
        self.max_item_price = max_item_price;
        self
    }

    /// Set how far `quantity * unit_price` may drift from the line total.
    pub fn with_tolerance(mut self, abs: Decimal, ratio: Decimal) -> Self {
        self.tolerance_abs = abs;
        self.tolerance_ratio = ratio;
        self
    }

    /// Run the matcher table over one line and keep the first acceptable parse.
    pub fn parse_line(&self, line: &str) -> Option<ItemLine> {
        ItemLineMatcher::ALL
            .iter()
            .filter_map(|matcher| matcher.try_match(line))
            .find(|item| self.accept(item))
    }

    fn accept(&self, item: &ItemLine) -> bool {
        if item.quantity <= Decimal::ZERO
            || item.quantity > self.max_item_price
            || item.unit_price > self.max_item_price
            || item.total_price <= Decimal::ZERO
            || item.total_price > self.max_item_price
        {
            return false;
        }
        item.is_consistent(self.tolerance_abs, self.tolerance_ratio)
    }

    fn section_items(&self, lines: &[&str]) -> Vec<ExtractionMatch<ItemLine>> {
        let Some(header) = lines.iter().position(|l| is_header(l)) else {
            return Vec::new();
        };

        let mut items = Vec::new();
        let mut pending_name: Option<&str> = None;

        for &line in &lines[header + 1..] {
            if SECTION_END.is_match(line) {
                break;
            }
            if SECTION_NON_ITEM.is_match(line) {
                debug!("Skipping adjustment line in item section: {}", line);
                pending_name = None;
                continue;
            }
            if let Some(item) = self.parse_line(line) {
                items.push(ExtractionMatch::new(item, 0.85, line));
                pending_name = None;
                continue;
            }
            // Name wrapped onto its own line, numbers on the next
            match pending_name.take() {
                Some(name) if NUMERIC_ONLY.is_match(line) => {
                    let joined = format!("{name} {line}");
                    if let Some(item) = self.parse_line(&joined) {
                        items.push(ExtractionMatch::new(item, 0.75, joined));
                    }
                }
                _ if !NUMERIC_ONLY.is_match(line) => pending_name = Some(line),
                _ => {}
            }
        }

        items
    }

    fn scanned_items(&self, lines: &[&str]) -> Vec<ExtractionMatch<ItemLine>> {
        lines
            .iter()
            .filter(|line| !NON_ITEM.is_match(line) && !NUMERIC_ONLY.is_match(line))
            .filter_map(|line| {
                self.parse_line(line)
                    .map(|item| ExtractionMatch::new(item, 0.6, *line))
            })
            .collect()
    }
}

impl Default for ItemExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for ItemExtractor {
    type Output = ExtractionMatch<ItemLine>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// All items in text order, duplicates by normalized name removed.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let mut found = self.section_items(&lines);
        if found.is_empty() {
            debug!("No item section found, scanning all lines");
            found = self.scanned_items(&lines);
        }

        let mut seen = std::collections::HashSet::new();
        found.retain(|m| seen.insert(normalized_name(&m.value.name)));
        found
    }
}

fn is_header(line: &str) -> bool {
    if SERIAL_HEADER.is_match(line) {
        return true;
    }
    let mut words: Vec<String> = HEADER_WORD
        .captures_iter(line)
        .map(|c| c[1].to_lowercase().trim_end_matches('s').to_string())
        .collect();
    words.sort();
    words.dedup();
    words.len() >= 2
}

/// Strip serials and punctuation, then title-case.
fn clean_name(raw: &str) -> Option<String> {
    let name = LEADING_SERIAL.replace(raw.trim(), "");
    let name = name
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if name.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return None;
    }
    Some(title_case(&name))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut start = true;
    for c in s.chars() {
        if start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        start = !c.is_alphanumeric() && c != '\'';
    }
    out
}

fn normalized_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
