//! Date extraction for receipts.

use chrono::{Datelike, Local, NaiveDate};
use regex::Captures;
use tracing::debug;

use super::patterns::{DATE_DAY_MONTH, DATE_DMY, DATE_LABELED, DATE_MONTH_DAY, DATE_WORD, DATE_YMD};
use super::{ExtractionMatch, FieldExtractor};

/// Earliest purchase year accepted.
pub const MIN_YEAR: i32 = 2000;

/// Date field extractor.
///
/// Tries labeled dates first, then any date-shaped token in the text, then
/// lines mentioning "date" with the label stripped. Dates whose year falls
/// outside `[MIN_YEAR, max_year]` are treated as misses.
pub struct DateExtractor {
    max_year: i32,
}

impl DateExtractor {
    /// Create an extractor accepting years up to next year.
    pub fn new() -> Self {
        Self {
            max_year: Local::now().year() + 1,
        }
    }

    /// Set the latest accepted year.
    pub fn with_max_year(mut self, year: i32) -> Self {
        self.max_year = year;
        self
    }

    fn in_band(&self, date: NaiveDate) -> bool {
        (MIN_YEAR..=self.max_year).contains(&date.year())
    }

    fn labeled(&self, text: &str) -> Option<ExtractionMatch<NaiveDate>> {
        DATE_LABELED.captures_iter(text).find_map(|caps| {
            let date = parse_fuzzy_date(&caps[1]).filter(|d| self.in_band(*d))?;
            Some(ExtractionMatch::new(date, 0.95, &caps[0]))
        })
    }

    fn shaped(&self, text: &str) -> Vec<ExtractionMatch<NaiveDate>> {
        let mut found = Vec::new();

        for line in text.lines() {
            for (_, date, source) in shaped_dates(line) {
                if self.in_band(date) {
                    found.push(ExtractionMatch::new(date, 0.8, source));
                } else {
                    debug!("Rejected out-of-band date {} in line: {}", date, line);
                }
            }
        }

        found
    }

    fn date_lines(&self, text: &str) -> Option<ExtractionMatch<NaiveDate>> {
        text.lines().find_map(|line| {
            let m = DATE_WORD.find(line)?;
            let rest = &line[m.end()..];
            let date = parse_fuzzy_date(rest).filter(|d| self.in_band(*d))?;
            Some(ExtractionMatch::new(date, 0.6, line))
        })
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        if let Some(m) = self.labeled(text) {
            return Some(m);
        }

        if let Some(m) = self.shaped(text).into_iter().next() {
            return Some(m);
        }

        let result = self.date_lines(text);
        if result.is_none() {
            debug!("No date found");
        }
        result
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();
        for m in self.labeled(text).into_iter().chain(self.shaped(text)) {
            if !results.iter().any(|r| r.value == m.value) {
                results.push(m);
            }
        }
        results
    }
}

/// Every date-shaped token on one line as `(offset, date, source)`, left to right.
fn shaped_dates(line: &str) -> Vec<(usize, NaiveDate, &str)> {
    let mut found = Vec::new();

    for caps in DATE_YMD.captures_iter(line) {
        let date = num(&caps, 1).and_then(|y| {
            NaiveDate::from_ymd_opt(y as i32, num(&caps, 2)?, num(&caps, 3)?)
        });
        push_match(&mut found, &caps, date);
    }

    for caps in DATE_DMY.captures_iter(line) {
        let date = match (num(&caps, 1), num(&caps, 2)) {
            (Some(a), Some(b)) => day_first(a, b, expand_year(&caps[3])),
            _ => None,
        };
        push_match(&mut found, &caps, date);
    }

    for caps in DATE_DAY_MONTH.captures_iter(line) {
        let date = num(&caps, 1).and_then(|day| {
            NaiveDate::from_ymd_opt(expand_year(&caps[3]), month_number(&caps[2])?, day)
        });
        push_match(&mut found, &caps, date);
    }

    for caps in DATE_MONTH_DAY.captures_iter(line) {
        let date = num(&caps, 2).and_then(|day| {
            NaiveDate::from_ymd_opt(expand_year(&caps[3]), month_number(&caps[1])?, day)
        });
        push_match(&mut found, &caps, date);
    }

    found.sort_by_key(|(start, _, _)| *start);
    found
}

fn push_match<'a>(
    found: &mut Vec<(usize, NaiveDate, &'a str)>,
    caps: &Captures<'a>,
    date: Option<NaiveDate>,
) {
    let (Some(date), Some(m)) = (date, caps.get(0)) else {
        return;
    };
    // One date per offset
    if found.iter().any(|(start, _, _)| *start == m.start()) {
        return;
    }
    found.push((m.start(), date, m.as_str()));
}

/// Parse a date from loosely formatted text, day-first.
///
/// Uses the earliest date-shaped token; failing that, the first three
/// numeric groups are read as day, month, year.
pub fn parse_fuzzy_date(s: &str) -> Option<NaiveDate> {
    if let Some((_, date, _)) = shaped_dates(s).into_iter().next() {
        return Some(date);
    }

    let groups: Vec<&str> = s
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .take(3)
        .collect();

    match groups.as_slice() {
        [a, b, y] if a.len() <= 2 && b.len() <= 2 && (y.len() == 2 || y.len() == 4) => {
            day_first(a.parse().ok()?, b.parse().ok()?, expand_year(y))
        }
        [y, m, d] if y.len() == 4 && m.len() <= 2 && d.len() <= 2 => {
            NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
        }
        _ => None,
    }
}

/// Resolve `a/b/year`, preferring day-first unless only month-first is valid.
fn day_first(a: u32, b: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, b, a).or_else(|| NaiveDate::from_ymd_opt(year, a, b))
}

fn num(caps: &Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn expand_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 { 2000 + year } else { year }
}

fn month_number(month: &str) -> Option<u32> {
    let month = month.to_lowercase();
    let n = match month.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}
