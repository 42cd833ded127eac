use serde::Serialize;
use tracing::debug;

use crate::records::{LegacyTestType, Outcome, TestCategory, TestRecord};

/// Category assigned when no keyword rule matches.
pub const DEFAULT_CATEGORY: TestCategory = TestCategory::RcdTripTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Declared,
    Inferred,
}

/// Classify a test name by case-insensitive keyword match. Rules are tried in
/// order and the first match wins; every input maps to a category.
pub fn classify(name: &str) -> TestCategory {
    classify_rule(name).unwrap_or(DEFAULT_CATEGORY)
}

/// The keyword rules alone, `None` when nothing matched.
fn classify_rule(name: &str) -> Option<TestCategory> {
    let name = name.to_lowercase();
    if name.contains("mcb") && (name.contains("trip") || name.contains("time")) {
        Some(TestCategory::McbTripTime)
    } else if name.contains("rcd") && (name.contains("value") || name.contains("trip value")) {
        Some(TestCategory::RcdTripValue)
    } else if name.contains("rcd") && (name.contains("trip") || name.contains("time")) {
        Some(TestCategory::RcdTripTime)
    } else {
        None
    }
}

/// The first non-blank of `name`, `originalname` and `description`.
fn category_text(record: &TestRecord) -> &str {
    [
        record.name.as_str(),
        record.originalname.as_str(),
        record.description.as_str(),
    ]
    .into_iter()
    .find(|text| !text.trim().is_empty())
    .unwrap_or("")
}

/// Declared category if the record carries one, otherwise the inferred one.
pub fn resolve_category(record: &TestRecord) -> (TestCategory, CategorySource) {
    if let Some(category) = record.category {
        return (category, CategorySource::Declared);
    }
    let text = category_text(record);
    match classify_rule(text) {
        Some(category) => (category, CategorySource::Inferred),
        None => {
            debug!(
                "No category rule matched {:?}, falling back to {}",
                text, DEFAULT_CATEGORY
            );
            (DEFAULT_CATEGORY, CategorySource::Inferred)
        }
    }
}

/// Coarse classification used by the legacy `Meter/MCB/RCD Test` filters.
pub fn classify_legacy(name: &str) -> LegacyTestType {
    let name = name.to_lowercase();
    if name.contains("decabit") || name.contains("telenerg") {
        LegacyTestType::Meter
    } else if name.contains("mcb") {
        LegacyTestType::Mcb
    } else if name.contains("rcd") {
        LegacyTestType::Rcd
    } else {
        LegacyTestType::Meter
    }
}

/// Explicit outcome when present; otherwise derived from the legacy flags, and
/// as a last resort from the presence of a trip measurement.
pub fn resolve_outcome(record: &TestRecord) -> Outcome {
    if let Some(outcome) = record.outcome {
        return outcome;
    }
    if record.passed {
        Outcome::Passed
    } else if record.failed {
        Outcome::Failed
    } else if record.error {
        Outcome::Error
    } else if record.skipped {
        Outcome::Skipped
    } else if record.trip_time.is_some() || record.trip_value.is_some() {
        debug!("Inferring pass for {:?} from trip measurement", record.name);
        Outcome::Passed
    } else {
        Outcome::Skipped
    }
}
