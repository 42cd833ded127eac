//! Dashboard aggregates derived from a flat list of test records.
//!
//! Everything here is a pure function of its input: records are classified,
//! filtered, then folded into counters in a single pass. Nothing is cached
//! between requests.

pub mod buckets;
pub mod classify;
pub mod daily;
pub mod extract;
pub mod performance;
pub mod series;

use serde::Serialize;
use tracing::debug;

use crate::records::fetch::SourceKind;
use crate::records::{Outcome, TestCategory, TestRecord, TypeFilter};
use buckets::{CurrentBuckets, MaxCurrent, MaxCurrentTracker};
use classify::{classify_legacy, resolve_category, resolve_outcome, CategorySource};
use daily::{round2, DailySeries, DayCount, DayHours, DedupHours};
use performance::{McbPerformance, PerformanceAggregator, RcdPerformance};
use series::{TripTimeSeries, TripTimeSeriesBuilder};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_hours: f64,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub pass_rate: f64,
    pub tests_per_day: Vec<DayCount>,
    pub hours_per_day: Vec<DayHours>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcb_current_buckets: Option<CurrentBuckets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcb_max_current: Option<MaxCurrent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcb_performance: Option<McbPerformance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcd_performance: Option<RcdPerformance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcb_trip_time_series: Option<Vec<TripTimeSeries>>,
    pub declared_categories: u64,
    pub inferred_categories: u64,
    pub source: SourceKind,
}

/// Whether a record belongs to the selected test type.
pub fn matches_filter(record: &TestRecord, category: TestCategory, filter: &TypeFilter) -> bool {
    match filter {
        TypeFilter::All => true,
        TypeFilter::Category(wanted) => category == *wanted,
        TypeFilter::Legacy(wanted) => classify_legacy(&record.name) == *wanted,
    }
}

/// Fold the records matching `filter` into dashboard metrics.
pub fn compute_metrics(
    records: &[TestRecord],
    filter: &TypeFilter,
    source: SourceKind,
) -> DashboardMetrics {
    let mut total_tests = 0u64;
    let mut passed = 0u64;
    let mut failed = 0u64;
    let mut skipped = 0u64;
    let mut declared = 0u64;
    let mut inferred = 0u64;

    let mut total_hours = DedupHours::default();
    let mut daily = DailySeries::default();

    let mut saw_mcb = false;
    let mut buckets = CurrentBuckets::default();
    let mut max_current = MaxCurrentTracker::default();
    let mut performance = PerformanceAggregator::default();
    let mut trip_series = TripTimeSeriesBuilder::default();

    for record in records {
        let (category, category_source) = resolve_category(record);
        if !matches_filter(record, category, filter) {
            continue;
        }

        total_tests += 1;
        match category_source {
            CategorySource::Declared => declared += 1,
            CategorySource::Inferred => inferred += 1,
        }
        match resolve_outcome(record) {
            Outcome::Passed => passed += 1,
            Outcome::Failed | Outcome::Error => failed += 1,
            Outcome::Skipped => skipped += 1,
        }

        total_hours.add(record);
        daily.add(record);

        if category == TestCategory::McbTripTime {
            saw_mcb = true;
            if let Some(current) = extract::resolve_current(record) {
                buckets.add(current);
                max_current.observe(current);
            }
            trip_series.add(record);
        }
        performance.observe(record, category);
    }

    let (tests_per_day, hours_per_day) = daily.finish();
    let (mcb_performance, rcd_performance) = performance.finish();
    let pass_rate = if total_tests > 0 {
        round2(passed as f64 / total_tests as f64 * 100.0)
    } else {
        0.0
    };

    debug!(
        "Computed metrics over {} of {} records ({} declared, {} inferred)",
        total_tests,
        records.len(),
        declared,
        inferred
    );

    DashboardMetrics {
        total_hours: round2(total_hours.hours()),
        total_tests,
        passed_tests: passed,
        failed_tests: failed,
        skipped_tests: skipped,
        pass_rate,
        tests_per_day,
        hours_per_day,
        mcb_current_buckets: saw_mcb.then_some(buckets),
        mcb_max_current: max_current.finish(),
        mcb_performance,
        rcd_performance,
        mcb_trip_time_series: (!trip_series.is_empty()).then(|| trip_series.finish()),
        declared_categories: declared,
        inferred_categories: inferred,
        source,
    }
}
