pub mod db;
pub mod fetch;
pub mod synthetic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestCategory {
    #[serde(rename = "MCB Trip Time")]
    McbTripTime,
    #[serde(rename = "RCD Trip Time")]
    RcdTripTime,
    #[serde(rename = "RCD Trip Value")]
    RcdTripValue,
}

impl TestCategory {
    pub const ALL: [TestCategory; 3] = [
        TestCategory::McbTripTime,
        TestCategory::RcdTripTime,
        TestCategory::RcdTripValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::McbTripTime => "MCB Trip Time",
            Self::RcdTripTime => "RCD Trip Time",
            Self::RcdTripValue => "RCD Trip Value",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse categories from the first dashboard revision. Only accepted as a
/// query filter; records are never classified into them for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyTestType {
    #[serde(rename = "Meter Test")]
    Meter,
    #[serde(rename = "MCB Test")]
    Mcb,
    #[serde(rename = "RCD Test")]
    Rcd,
}

impl LegacyTestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meter => "Meter Test",
            Self::Mcb => "MCB Test",
            Self::Rcd => "RCD Test",
        }
    }

    /// Name keywords the storage layer matches (case-insensitively) for this type.
    pub fn name_keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Meter => &["decabit", "telenerg"],
            Self::Mcb => &["mcb"],
            Self::Rcd => &["rcd"],
        }
    }
}

/// The test-type selector of a dashboard or record query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Category(TestCategory),
    Legacy(LegacyTestType),
}

impl TypeFilter {
    /// Keywords pushed down to the record source to narrow the fetch. The
    /// engine re-applies the exact filter afterwards.
    pub fn name_keywords(&self) -> Vec<String> {
        let keywords: &[&str] = match self {
            // A declared category or the RCD Trip Time fallback can put any
            // name in any category, so category filters never narrow by name.
            Self::All | Self::Category(_) => &[],
            Self::Legacy(legacy) => legacy.name_keywords(),
        };
        keywords.iter().map(|k| k.to_string()).collect()
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if let Some(category) = TestCategory::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
        {
            return Ok(Self::Category(*category));
        }
        for legacy in [LegacyTestType::Meter, LegacyTestType::Mcb, LegacyTestType::Rcd] {
            if legacy.as_str().eq_ignore_ascii_case(trimmed) {
                return Ok(Self::Legacy(legacy));
            }
        }
        Err(format!("unknown test type: {}", trimmed))
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Category(c) => f.write_str(c.as_str()),
            Self::Legacy(l) => f.write_str(l.as_str()),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Error,
}

/// A breaker rating as it arrives from the test rig: either a bare number or
/// a curve-qualified string such as `"B16"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCondition {
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub amplitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// One executed test as produced by the test-execution system. Read-only
/// from this service's point of view; fields the engine does not read are
/// kept in `extra` so stored documents round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        deserialize_with = "deserialize_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub originalname: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub session_uuid4: String,
    pub start: f64,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop: Option<f64>,
    pub duration: f64,
    /// Declared category. When absent the category is inferred from the name.
    #[serde(
        default,
        alias = "test_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<TestCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TestCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub multiplier: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub trip_time: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub trip_value: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub upper_limit: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts a plain string id or a Mongo-style `{"$oid": "..."}` object.
fn deserialize_record_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(map)) => map
            .get("$oid")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Optional measurements: a number or numeric string. Anything else drops
/// just this field, never the record.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

impl TestRecord {
    /// Minimal record with everything optional left empty. Used by the
    /// synthetic generator and tests.
    pub fn new(name: impl Into<String>, session: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            originalname: String::new(),
            description: String::new(),
            session_uuid4: session.into(),
            start,
            stop: Some(start + duration),
            duration,
            category: None,
            outcome: None,
            passed: false,
            failed: false,
            skipped: false,
            error: false,
            condition: None,
            rating: None,
            multiplier: None,
            trip_time: None,
            trip_value: None,
            upper_limit: None,
            extra: Map::new(),
        }
    }

    /// `name`, `originalname` and `description` joined for text extraction.
    pub fn combined_text(&self) -> String {
        [
            self.name.as_str(),
            self.originalname.as_str(),
            self.description.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if !self.start.is_finite() {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis((self.start * 1000.0).round() as i64)
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Inclusive `start` window plus optional case-insensitive name keywords
/// (any keyword matching is enough).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub name_keywords: Vec<String>,
}

impl RecordQuery {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>, filter: TypeFilter) -> Self {
        Self {
            from,
            to,
            name_keywords: filter.name_keywords(),
        }
    }

    pub fn from_epoch(&self) -> f64 {
        self.from.timestamp_millis() as f64 / 1000.0
    }

    pub fn to_epoch(&self) -> f64 {
        self.to.timestamp_millis() as f64 / 1000.0
    }

    /// The same predicate the database applies, for in-memory sources.
    pub fn matches(&self, record: &TestRecord) -> bool {
        if record.start < self.from_epoch() || record.start > self.to_epoch() {
            return false;
        }
        if self.name_keywords.is_empty() {
            return true;
        }
        let name = record.name.to_lowercase();
        self.name_keywords
            .iter()
            .any(|k| name.contains(&k.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_deserializes_mongo_document() {
        let doc = json!({
            "_id": {"$oid": "65a1"},
            "name": "test_mcb_trip_time[B16_5x]",
            "originalname": "test_mcb_trip_time",
            "description": "",
            "session_uuid4": "s-1",
            "start": 1704067200.5,
            "stop": 1704067320.5,
            "duration": 120.0,
            "outcome": "passed",
            "passed": true,
            "rating": "B16",
            "multiplier": 5,
            "condition": {"command": 3, "amplitude": 1.2, "frequency": 175, "state": "On"},
            "xray": {"key": "STG1-1"}
        });

        let record: TestRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.id.as_deref(), Some("65a1"));
        assert_eq!(record.rating, Some(Rating::Text("B16".to_string())));
        assert_eq!(record.multiplier, Some(5.0));
        assert_eq!(record.outcome, Some(Outcome::Passed));
        assert_eq!(record.condition.unwrap().amplitude, Some(1.2));
        assert!(record.extra.contains_key("xray"));
    }

    #[test]
    fn test_record_accepts_numeric_rating_and_test_type_alias() {
        let doc = json!({
            "name": "whatever",
            "start": 0,
            "duration": 1,
            "rating": 32,
            "test_type": "RCD Trip Value"
        });
        let record: TestRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.rating, Some(Rating::Number(32.0)));
        assert_eq!(record.category, Some(TestCategory::RcdTripValue));
        assert!(record.id.is_none());
    }

    #[test]
    fn test_malformed_measurement_drops_only_that_field() {
        let doc = json!({
            "name": "mcb_trip_test",
            "start": 1704067200,
            "duration": 60,
            "trip_time": "n/a",
            "upper_limit": "0.1",
            "multiplier": {"value": 5}
        });
        let record: TestRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.trip_time, None);
        assert_eq!(record.upper_limit, Some(0.1));
        assert_eq!(record.multiplier, None);
    }

    #[test]
    fn test_type_filter_parsing() {
        assert_eq!("All".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!("".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!(
            "mcb trip time".parse::<TypeFilter>().unwrap(),
            TypeFilter::Category(TestCategory::McbTripTime)
        );
        assert_eq!(
            "Meter Test".parse::<TypeFilter>().unwrap(),
            TypeFilter::Legacy(LegacyTestType::Meter)
        );
        assert!("Toaster Test".parse::<TypeFilter>().is_err());
    }

    #[test]
    fn test_category_filters_do_not_narrow_fetch() {
        for category in TestCategory::ALL {
            assert!(TypeFilter::Category(category).name_keywords().is_empty());
        }
        assert_eq!(
            TypeFilter::Legacy(LegacyTestType::Meter).name_keywords(),
            vec!["decabit".to_string(), "telenerg".to_string()]
        );
    }

    #[test]
    fn test_query_matches_inclusive_bounds_and_keywords() {
        let from = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let to = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        let query = RecordQuery::new(from, to, TypeFilter::Legacy(LegacyTestType::Meter));

        assert!(query.matches(&TestRecord::new("test_DECABIT", "s", 1_000.0, 1.0)));
        assert!(query.matches(&TestRecord::new("test_telenerg", "s", 2_000.0, 1.0)));
        assert!(!query.matches(&TestRecord::new("test_mcb", "s", 1_500.0, 1.0)));
        assert!(!query.matches(&TestRecord::new("test_decabit", "s", 2_000.5, 1.0)));
    }
}
