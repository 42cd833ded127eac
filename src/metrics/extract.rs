use regex::Regex;
use std::sync::LazyLock;

use crate::records::{Rating, TestRecord};

// Tried in order, first match wins.
static MULTIPLIER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "5x", "2.5 ×", but not the "16x" of "B16x5"
        Regex::new(r"(?i)(?:^|[^a-z0-9.])(\d+(?:\.\d+)?)\s*[x×]").unwrap(),
        // "x5", "× 10"
        Regex::new(r"(?i)(?:^|[^a-z])[x×]\s*(\d+(?:\.\d+)?)").unwrap(),
        Regex::new(r"(?i)multiplier\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap(),
    ]
});

// Curve designator followed by the rated current, e.g. "B16", "C32".
static LETTER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z](\d+(?:\.\d+)?)").unwrap());

static ANY_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_positive(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().and_then(positive)
}

/// Test-current multiple of the breaker rating, or `None` if unresolved.
pub fn resolve_multiplier(record: &TestRecord) -> Option<f64> {
    if let Some(m) = record.multiplier.and_then(positive) {
        return Some(m);
    }
    if let Some(amplitude) = record
        .condition
        .as_ref()
        .and_then(|c| c.amplitude)
        .and_then(positive)
    {
        return Some(amplitude);
    }
    multiplier_from_text(&record.combined_text())
}

pub fn multiplier_from_text(text: &str) -> Option<f64> {
    MULTIPLIER_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    })
    .and_then(parse_positive)
}

/// Rated current in amperes, or `None` if unresolved.
pub fn resolve_rating(record: &TestRecord) -> Option<f64> {
    match &record.rating {
        Some(Rating::Number(n)) => {
            if let Some(rating) = positive(*n) {
                return Some(rating);
            }
        }
        Some(Rating::Text(text)) => {
            if let Some(rating) = parse_positive(text).or_else(|| rating_from_text(text)) {
                return Some(rating);
            }
        }
        None => {}
    }
    rating_from_text(&record.combined_text())
}

/// Prefers a number directly after a letter over any standalone number.
pub fn rating_from_text(text: &str) -> Option<f64> {
    LETTER_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_positive(m.as_str()))
        .or_else(|| {
            ANY_NUMBER
                .find_iter(text)
                .find_map(|m| parse_positive(m.as_str()))
        })
}

/// Test current in amperes: multiplier × rating.
pub fn resolve_current(record: &TestRecord) -> Option<f64> {
    let multiplier = resolve_multiplier(record)?;
    let rating = resolve_rating(record)?;
    Some(multiplier * rating)
}
