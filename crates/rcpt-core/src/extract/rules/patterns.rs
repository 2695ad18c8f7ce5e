//! Common regex patterns for receipt extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// Amount token: Western (1,234.56), Indian (1,23,456.78), European (1.234,56) and plain forms.
pub const AMOUNT: &str = r"\d{1,3}(?:,\d{2,3})+(?:\.\d{1,2})?|\d{1,3}(?:\.\d{3})+,\d{1,2}|\d+(?:[.,]\d{1,2})?";

/// Currency marker that may precede an amount.
pub const CURRENCY: &str = r"(?:₹|rs\.?|inr|\$|€|£)";

/// Separators allowed between a label and its amount.
const SEP: &str = r"[\s:=\-]*";

fn labeled(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?i){label}\s*(?:\([^)]*\))?{SEP}{CURRENCY}?\s*({AMOUNT})"
    ))
    .unwrap()
}

lazy_static! {
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(&format!("(?:{AMOUNT})")).unwrap();

    // Totals, by priority tier
    pub static ref TOTAL_GRAND: Regex =
        labeled(r"\b(?:grand\s*total|total\s+amount|net\s+total|final\s+total)\b");

    pub static ref TOTAL_DUE: Regex = labeled(
        r"\b(?:amount\s+(?:due|payable|paid)|net\s+(?:amount|payable)(?:\s+payable)?|bill\s+amount|total\s+due)\b"
    );

    pub static ref TOTAL_PLAIN: Regex = labeled(r"\btotal\b");

    pub static ref TOTAL_BALANCE: Regex = labeled(r"\bbalance(?:\s+due)?\b");

    pub static ref TOTAL_YOU_PAY: Regex = labeled(r"\b(?:you\s+pay|to\s+pay)\b");

    pub static ref TOTAL_CURRENCY_TRAILING: Regex = Regex::new(&format!(
        r"(?i){CURRENCY}\s*({AMOUNT})\s*$"
    ))
    .unwrap();

    // Amount with cents, as printed next to prices
    pub static ref PRICED_AMOUNT: Regex = Regex::new(
        r"\d{1,3}(?:,\d{2,3})+[.,]\d{2}\b|\d{1,3}(?:\.\d{3})+,\d{2}\b|\d+[.,]\d{2}\b"
    ).unwrap();

    // Lines that carry amounts but are not the total
    pub static ref NOT_TOTAL: Regex = Regex::new(
        r"(?i)\b(?:sub\s*-?\s*total|total\s+(?:tax|gst|vat|savings?|discount|qty|quantity|items?)|savings?|saved|discount|change|cash|tender(?:ed)?|round(?:ing)?\s*off)\b"
    ).unwrap();

    // Subtotal
    pub static ref SUBTOTAL: Regex = labeled(
        r"\b(?:sub\s*-?\s*total|total\s+before\s+tax|taxable\s+(?:value|amount|amt))\b"
    );

    // Tax breakdown components (CGST @9% : 46.59)
    pub static ref TAX_COMPONENT: Regex = Regex::new(
        r"(?i)\b(cgst|sgst|igst|utgst|cess)\b"
    ).unwrap();

    pub static ref TAX_RATE: Regex = Regex::new(
        r"@?\s*\d+(?:\.\d+)?\s*%"
    ).unwrap();

    pub static ref TAX_LABELED: Regex = Regex::new(&format!(
        r"(?i)\b(?:total\s+)?(?:sales\s+tax|tax|gst|vat)\b(?:\s*(?:amount|amt))?\s*(?:@?\s*\d+(?:\.\d+)?\s*%)?{SEP}{CURRENCY}?\s*({AMOUNT})"
    ))
    .unwrap();

    // Dates
    pub static ref DATE_LABELED: Regex = Regex::new(
        r"(?im)\b(?:(?:bill|invoice|receipt|txn|transaction)\s*)?(?:date|dt|dated)\b\.?\s*[:\-]?\s*(.+)$"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[/\-.](\d{1,2})[/\-.](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_DAY_MONTH: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?[\s\-/.,]*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s\-/.,]*(\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_MONTH_DAY: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_WORD: Regex = Regex::new(r"(?i)\bdate\b").unwrap();

    // Merchant
    pub static ref MERCHANT_TRADEMARK: Regex = Regex::new(
        r"([A-Z][A-Z0-9&'.\- ]{2,}?)\s*[®™©]"
    ).unwrap();

    pub static ref MERCHANT_STORE_KEYWORD: Regex = Regex::new(
        r"(?i)\b(?:mart|store|stores|shop|supermarket)\b"
    ).unwrap();

    pub static ref MERCHANT_EXCLUDED: Regex = Regex::new(
        r"(?i)\b(?:cin|gstin|gst\s*no|pan|tin|fssai|vat|tax|invoice|receipt)\b"
    ).unwrap();

    pub static ref CONTACT: Regex = Regex::new(
        r"(?i)(?:\btel\b|\bph\b|\bphone\b|\bmob(?:ile)?\b|www\.|https?:|\be-?mail\b|@)"
    ).unwrap();

    // Receipt numbers
    pub static ref RECEIPT_NUMBER: Regex = Regex::new(
        r"(?i)\b(?:receipt|bill|invoice|inv|txn|transaction|trans)\s*(?:no\b|number\b|num\b|#|id\b)\.?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9/\-]*)"
    ).unwrap();

    pub static ref REFERENCE_NUMBER: Regex = Regex::new(
        r"(?i)\bref(?:erence)?\b\.?\s*(?:no\b|#)?\.?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9/\-]*)"
    ).unwrap();

    // Item table boundaries
    pub static ref SERIAL_HEADER: Regex = Regex::new(
        r"(?i)\b(?:s|sr|sl)\.?\s*no\b"
    ).unwrap();

    pub static ref SECTION_END: Regex = Regex::new(
        r"(?i)\b(?:sub\s*-?\s*)?total\b"
    ).unwrap();

    // Adjustments that can sit between item rows and the total
    pub static ref SECTION_NON_ITEM: Regex = Regex::new(
        r"(?i)\b(?:cgst|sgst|igst|utgst|cess|gst|vat|tax|discount|savings?|saved|round(?:ing)?\s*off|balance|change|tender(?:ed)?|cash|paid|payment)\b"
    ).unwrap();

    // Lines that are never items
    pub static ref NON_ITEM: Regex = Regex::new(
        r"(?i)\b(?:cgst|sgst|igst|utgst|cess|gst|gstin|vat|tax|total|subtotal|discount|savings?|saved|round(?:ing)?\s*off|balance|change|tender(?:ed)?|cash|paid|payment|amount|amt|due|qty|quantity|rate|mrp|hsn|particulars|description|cin|fssai|bill|invoice|receipt|date|time|tel|phone|mob(?:ile)?|thank|visit)\b"
    ).unwrap();

    pub static ref NUMERIC_ONLY: Regex = Regex::new(
        r"^[\d\s.,:/\-₹$%*#()+]+$"
    ).unwrap();

    pub static ref LEADING_SERIAL: Regex = Regex::new(
        r"^\d{1,2}[.)]?\s+"
    ).unwrap();
}
