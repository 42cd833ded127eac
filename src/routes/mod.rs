pub mod dashboard;
pub mod health;
pub mod test_results;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::DashboardError;
use crate::records::{RecordQuery, TypeFilter};

/// Query string shared by the record and metrics endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub test_type: Option<String>,
    /// Identifies the dashboard instance so a newer request can supersede
    /// its in-flight predecessor.
    pub viewer: Option<String>,
}

impl RangeParams {
    pub fn type_filter(&self) -> Result<TypeFilter, DashboardError> {
        match &self.test_type {
            Some(t) => t.parse().map_err(DashboardError::InvalidQuery),
            None => Ok(TypeFilter::All),
        }
    }

    /// Both bounds are required; a missing or unparsable bound is a client
    /// error, never silently defaulted.
    pub fn to_query(&self) -> Result<(RecordQuery, TypeFilter), DashboardError> {
        let from = parse_bound(self.start_date.as_deref(), "startDate", false)?;
        let to = parse_bound(self.end_date.as_deref(), "endDate", true)?;
        if from > to {
            return Err(DashboardError::InvalidQuery(
                "startDate must not be after endDate".to_string(),
            ));
        }
        let filter = self.type_filter()?;
        Ok((RecordQuery::new(from, to, filter), filter))
    }
}

/// RFC 3339 timestamps, or plain `YYYY-MM-DD` dates taken as the start (or,
/// for an end bound, the last millisecond) of that UTC day.
pub fn parse_bound(
    value: Option<&str>,
    field: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, DashboardError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DashboardError::InvalidQuery("startDate and endDate are required".to_string()))?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(Utc.from_utc_datetime(&date.and_time(time)));
        }
    }
    Err(DashboardError::InvalidQuery(format!(
        "{} is not an ISO 8601 date: {}",
        field, raw
    )))
}
