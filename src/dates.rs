//! Date normalization into the canonical `YYYY-MM-DD HH:MM:SS` form.
//!
//! Interpretation runs through an ordered chain of strategies and the first
//! one that matches wins:
//!
//! 1. explicit per-column format hints (chrono strftime patterns),
//! 2. numbers: Excel serial days when `-100000 < n < 100000`, otherwise Unix seconds,
//! 3. a fixed list of common human-readable layouts,
//! 4. year/month-only values retried with a synthetic first day.
//!
//! Nothing here fails. A value no strategy understands is returned unchanged,
//! and [`is_canonical_timestamp`] tells the two outcomes apart.

use std::{collections::BTreeMap, sync::OnceLock};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::data::Cell;

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
pub const EXCEL_UNIX_EPOCH_OFFSET_DAYS: i64 = 25_569;
const SECONDS_PER_DAY: i64 = 86_400;
const EXCEL_SERIAL_LIMIT: i64 = 100_000;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%d %B %Y",
    "%d-%B-%Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    FormatHints,
    Numeric,
    GeneralString,
    PartialDate,
}

const STRATEGY_CHAIN: [Strategy; 4] = [
    Strategy::FormatHints,
    Strategy::Numeric,
    Strategy::GeneralString,
    Strategy::PartialDate,
];

#[derive(Debug, Clone, Default)]
pub struct DateNormalizer {
    hints: BTreeMap<String, Vec<String>>,
}

impl DateNormalizer {
    pub fn new(hints: BTreeMap<String, Vec<String>>) -> Self {
        Self { hints }
    }

    pub fn hints_for(&self, column: &str) -> &[String] {
        self.hints.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the canonical form of `value`, or `value` itself when no
    /// interpretation succeeds.
    pub fn normalize(&self, value: &Cell, column: &str) -> Cell {
        if value.is_empty() {
            return value.clone();
        }
        match self.interpret(value, column) {
            Some(parsed) => Cell::Text(format_canonical(&parsed)),
            None => value.clone(),
        }
    }

    /// String form of [`DateNormalizer::normalize`].
    pub fn normalize_str(&self, value: &str, column: &str) -> String {
        self.normalize(&Cell::text(value), column).into_string()
    }

    /// Hints and the string layouts see the displayed form of the value, so
    /// a numeric cell such as `20200724` still reaches a `%Y%m%d` hint.
    pub fn interpret(&self, value: &Cell, column: &str) -> Option<NaiveDateTime> {
        if value.is_empty() {
            return None;
        }
        let display = value.as_display();
        let text = display.trim();
        STRATEGY_CHAIN.iter().find_map(|strategy| {
            self.attempt(*strategy, value, text, column)
                .filter(has_four_digit_year)
        })
    }

    fn attempt(
        &self,
        strategy: Strategy,
        value: &Cell,
        text: &str,
        column: &str,
    ) -> Option<NaiveDateTime> {
        match strategy {
            Strategy::FormatHints => self
                .hints_for(column)
                .iter()
                .find_map(|pattern| parse_with_pattern(text, pattern)),
            Strategy::Numeric => numeric_value(value).and_then(from_numeric),
            Strategy::GeneralString => parse_general(text),
            Strategy::PartialDate => parse_partial(text),
        }
    }
}

fn numeric_value(value: &Cell) -> Option<f64> {
    let number = match value {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Empty => return None,
    };
    number.is_finite().then_some(number)
}

/// Interprets a number as Excel serial days or Unix seconds, truncating
/// toward zero first.
pub fn from_numeric(number: f64) -> Option<NaiveDateTime> {
    let whole = number.trunc() as i64;
    let seconds = if whole > -EXCEL_SERIAL_LIMIT && whole < EXCEL_SERIAL_LIMIT {
        (whole - EXCEL_UNIX_EPOCH_OFFSET_DAYS) * SECONDS_PER_DAY
    } else {
        whole
    };
    from_unix_seconds(seconds)
}

pub fn from_unix_seconds(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

fn parse_with_pattern(value: &str, pattern: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
        return Some(parsed);
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, pattern) {
        return parsed.and_hms_opt(0, 0, 0);
    }
    DateTime::parse_from_str(value, pattern)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Parses common date and date-time layouts. Slash dates are month-first,
/// dash and dot dates with a trailing year are day-first.
pub fn parse_general(value: &str) -> Option<NaiveDateTime> {
    if value.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt)
            && year_is_spelled_out(value, fmt, parsed.year())
        {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt)
            && year_is_spelled_out(value, fmt, parsed.year())
        {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|parsed| parsed.naive_utc())
}

/// chrono reads `%Y` from any number of digits, so `3/5/21` would otherwise
/// match `%Y/%m/%d` as year 3.
fn year_is_spelled_out(value: &str, fmt: &str, year: i32) -> bool {
    !fmt.contains("%Y") || value.contains(&format!("{year:04}"))
}

fn has_four_digit_year(value: &NaiveDateTime) -> bool {
    (0..=9999).contains(&value.year())
}

/// `YYYY/MM` and `YYYY-MM` style values get a first-of-month day appended.
fn parse_partial(value: &str) -> Option<NaiveDateTime> {
    let padded = if value.split('/').count() == 2 {
        format!("{value}/01")
    } else if value.split('-').count() == 2 {
        format!("{value}-01")
    } else {
        return None;
    };
    parse_general(&padded)
}

pub fn format_canonical(value: &NaiveDateTime) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

pub fn is_canonical_timestamp(value: &str) -> bool {
    static CANONICAL: OnceLock<Regex> = OnceLock::new();
    CANONICAL
        .get_or_init(|| {
            Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("canonical timestamp regex")
        })
        .is_match(value)
}
