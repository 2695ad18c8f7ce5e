//! Merchant name extraction.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::patterns::{CONTACT, MERCHANT_EXCLUDED, MERCHANT_STORE_KEYWORD, MERCHANT_TRADEMARK, NUMERIC_ONLY};
use super::{ExtractionMatch, FieldExtractor};

lazy_static! {
    /// Known retail chains as (name variant, canonical name), most specific first.
    static ref KNOWN_MERCHANTS: Vec<(Regex, &'static str)> = [
        (r"\bD[\s\-]?MART\b", "D-Mart"),
        (r"\bAVENUE\s+SUPERMARTS\b", "D-Mart (Avenue Supermarts Ltd)"),
        (r"\bBIG\s+BAZAAR\b", "Big Bazaar"),
        (r"\bRELIANCE\b", "Reliance Fresh/Smart"),
        (r"\bMORE\b", "More Supermarket"),
        (r"\bSPENCER'?S\b", "Spencer's Retail"),
        (r"\bFOOD\s+WORLD\b", "Food World"),
        (r"\bSTAR\s+BAZAAR\b", "Star Bazaar"),
        (r"\bEASYDAY\b", "Easyday Club"),
        (r"\bHYPERCITY\b", "HyperCITY"),
        (r"\bNATURE'?S\s+BASKET\b", "Nature's Basket"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(&format!("(?i){pattern}")).unwrap(), name))
    .collect();
}

/// Merchant name extractor.
///
/// Strategies run in order and the first hit wins: known chains, then
/// trademark or store-keyword header lines, then the first plain header line.
pub struct MerchantExtractor {
    header_lines: usize,
    fallback_lines: usize,
}

impl MerchantExtractor {
    pub fn new() -> Self {
        Self {
            header_lines: 10,
            fallback_lines: 8,
        }
    }

    /// Set how many lines from the top are searched.
    pub fn with_header_lines(mut self, header_lines: usize, fallback_lines: usize) -> Self {
        self.header_lines = header_lines;
        self.fallback_lines = fallback_lines;
        self
    }

    fn known_chain(&self, lines: &[&str]) -> Option<ExtractionMatch<String>> {
        lines.iter().take(self.header_lines).find_map(|line| {
            KNOWN_MERCHANTS
                .iter()
                .find(|(pattern, _)| pattern.is_match(line))
                .map(|(_, name)| ExtractionMatch::new(name.to_string(), 0.95, *line))
        })
    }

    fn store_header(&self, lines: &[&str]) -> Option<ExtractionMatch<String>> {
        for line in lines.iter().take(self.header_lines) {
            if is_excluded(line) {
                continue;
            }
            if let Some(caps) = MERCHANT_TRADEMARK.captures(line) {
                let name = clean_name(&caps[1]);
                if is_plausible_name(&name) {
                    return Some(ExtractionMatch::new(name, 0.85, *line));
                }
            }
            if MERCHANT_STORE_KEYWORD.is_match(line) {
                let name = clean_name(line);
                if is_plausible_name(&name) {
                    return Some(ExtractionMatch::new(name, 0.75, *line));
                }
            }
        }
        None
    }

    fn first_plain_line(&self, lines: &[&str]) -> Option<ExtractionMatch<String>> {
        lines
            .iter()
            .take(self.fallback_lines)
            .filter(|line| !is_excluded(line))
            .map(|line| (clean_name(line), *line))
            .find(|(name, _)| is_plausible_name(name))
            .map(|(name, line)| ExtractionMatch::new(name, 0.5, line))
    }
}

impl Default for MerchantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for MerchantExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let found = self
            .known_chain(&lines)
            .or_else(|| self.store_header(&lines))
            .or_else(|| self.first_plain_line(&lines));

        match found {
            Some(mut m) => {
                m.value = correct_ocr_digits(&m.value);
                Some(m)
            }
            None => {
                debug!("No merchant found");
                None
            }
        }
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.extract(text).into_iter().collect()
    }
}

fn is_excluded(line: &str) -> bool {
    MERCHANT_EXCLUDED.is_match(line) || CONTACT.is_match(line) || NUMERIC_ONLY.is_match(line)
}

fn clean_name(s: &str) -> String {
    s.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != ')')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reject candidates that are mostly digits or implausibly short or long.
fn is_plausible_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return false;
    }
    let digits = name.chars().filter(|c| c.is_ascii_digit()).count();
    let letters = name.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2 && digits * 2 <= len
}

/// Fix `0`→`O` and `5`→`S` inside words that are otherwise letters.
///
/// Tokens containing two or more digits (store codes, branch numbers) are
/// left alone.
pub fn correct_ocr_digits(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let digits = word.chars().filter(|c| c.is_ascii_digit()).count();
            let letters = word.chars().filter(|c| c.is_alphabetic()).count();
            if digits == 1 && letters >= 2 {
                word.replace('0', "O").replace('5', "S")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
