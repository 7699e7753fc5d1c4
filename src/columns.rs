//! Column label normalization and resolution.
//!
//! Provider tables change their column wording between releases (units get
//! appended, spacing moves, a typo gets fixed). Every logical field therefore
//! carries an ordered list of acceptable labels, and lookups go through
//! three tiers: exact match, normalized match, normalized substring match.
//! Ties are broken by candidate order first, then by table order.

use std::collections::HashMap;

use crate::models::Table;

/// Characters stripped from labels before comparison
const STRIPPED_SYMBOLS: &[char] = &[
    '(', ')', '[', ']', '{', '}', '%', '％', '원', ',', '.', '-', '_', '/',
];

/// Comparison key for a column label.
///
/// Removes whitespace, unit/punctuation symbols and digits. The result can be
/// empty; an empty key never matches anything in [`resolve`].
pub fn normalize(label: Option<&str>) -> String {
    label
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !STRIPPED_SYMBOLS.contains(c))
        .filter(|c| !is_decimal_digit(*c))
        .collect()
}

// Decimal digits only; circled numbers, fractions and roman numerals stay
fn is_decimal_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// Find the actual column label for a logical field.
pub fn resolve<'a>(table: &'a Table, candidates: &[&str]) -> Option<&'a str> {
    if table.columns.is_empty() {
        return None;
    }

    // 1) exact
    for candidate in candidates {
        if let Some(actual) = table.columns.iter().find(|c| c.as_str() == *candidate) {
            return Some(actual.as_str());
        }
    }

    // First column wins when two labels normalize to the same key
    let normalized: Vec<(String, &str)> = table
        .columns
        .iter()
        .map(|c| (normalize(Some(c.as_str())), c.as_str()))
        .collect();
    let mut by_key: HashMap<&str, &str> = HashMap::with_capacity(normalized.len());
    for (key, actual) in &normalized {
        if !key.is_empty() {
            by_key.entry(key.as_str()).or_insert(*actual);
        }
    }

    // 2) normalized
    for candidate in candidates {
        let key = normalize(Some(*candidate));
        if key.is_empty() {
            continue;
        }
        if let Some(actual) = by_key.get(key.as_str()) {
            return Some(*actual);
        }
    }

    // 3) normalized substring
    for candidate in candidates {
        let key = normalize(Some(*candidate));
        if key.is_empty() {
            continue;
        }
        if let Some((_, actual)) = normalized.iter().find(|(k, _)| k.contains(&key)) {
            return Some(*actual);
        }
    }

    None
}

/// A logical field and the labels it may appear under, most preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub field: &'static str,
    pub candidates: &'static [&'static str],
}

impl ColumnSpec {
    pub const fn new(field: &'static str, candidates: &'static [&'static str]) -> Self {
        Self { field, candidates }
    }

    pub fn resolve<'a>(&self, table: &'a Table) -> Option<&'a str> {
        resolve(table, self.candidates)
    }
}

pub const OPEN: ColumnSpec = ColumnSpec::new("open", &["시가"]);
pub const HIGH: ColumnSpec = ColumnSpec::new("high", &["고가"]);
pub const LOW: ColumnSpec = ColumnSpec::new("low", &["저가"]);
pub const CLOSE: ColumnSpec = ColumnSpec::new("close", &["종가"]);
pub const VOLUME: ColumnSpec = ColumnSpec::new("volume", &["거래량"]);

/// Fields a record cannot exist without
pub const REQUIRED: [ColumnSpec; 5] = [OPEN, HIGH, LOW, CLOSE, VOLUME];

pub const TURNOVER_VALUE: ColumnSpec = ColumnSpec::new("turnoverValue", &["거래대금", "거래대금(원)"]);
// 등락율 is a misspelling some releases used
pub const CHANGE_PERCENT: ColumnSpec =
    ColumnSpec::new("changePercent", &["등락률", "등락률(%)", "등락율"]);

pub const INDIVIDUAL_NET: ColumnSpec = ColumnSpec::new("individualNet", &["개인"]);
pub const FOREIGN_NET: ColumnSpec = ColumnSpec::new("foreignNet", &["외국인합계", "외국인"]);
pub const INSTITUTION_NET: ColumnSpec = ColumnSpec::new("institutionNet", &["기관합계", "기관"]);

pub const SHORT_QTY: ColumnSpec =
    ColumnSpec::new("shortQty", &["공매도거래량", "공매도", "거래량"]);
pub const SHORT_VALUE: ColumnSpec = ColumnSpec::new("shortValue", &["공매도거래대금", "거래대금"]);
pub const SHORT_RATIO: ColumnSpec = ColumnSpec::new("shortRatio", &["비중", "공매도비중"]);
