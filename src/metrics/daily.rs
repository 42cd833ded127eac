use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::records::TestRecord;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayHours {
    pub date: String,
    pub hours: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sums session hours, counting each `(session, duration)` pair once.
///
/// Only hours are deduplicated; callers count rows separately. Each
/// aggregate scope (the global total, every day bucket) owns its own
/// instance so a pair seen on one day still contributes to another.
#[derive(Debug, Default)]
pub struct DedupHours<'a> {
    seen: HashSet<(&'a str, u64)>,
    seconds: f64,
}

impl<'a> DedupHours<'a> {
    pub fn add(&mut self, record: &'a TestRecord) {
        if !record.duration.is_finite() || record.duration < 0.0 {
            return;
        }
        if self
            .seen
            .insert((record.session_uuid4.as_str(), record.duration.to_bits()))
        {
            self.seconds += record.duration;
        }
    }

    pub fn hours(&self) -> f64 {
        self.seconds / SECONDS_PER_HOUR
    }
}

#[derive(Debug, Default)]
struct DayBucket<'a> {
    count: u64,
    hours: DedupHours<'a>,
}

/// Per-day counts and hours keyed by UTC calendar date.
#[derive(Debug, Default)]
pub struct DailySeries<'a> {
    days: BTreeMap<String, DayBucket<'a>>,
}

impl<'a> DailySeries<'a> {
    /// Records whose `start` is not a valid timestamp are left out of the
    /// series; they still count towards the totals.
    pub fn add(&mut self, record: &'a TestRecord) {
        let Some(started_at) = record.started_at() else {
            return;
        };
        let date = started_at.format("%Y-%m-%d").to_string();
        let bucket = self.days.entry(date).or_default();
        bucket.count += 1;
        bucket.hours.add(record);
    }

    /// Both series ascending by date.
    pub fn finish(self) -> (Vec<DayCount>, Vec<DayHours>) {
        let mut counts = Vec::with_capacity(self.days.len());
        let mut hours = Vec::with_capacity(self.days.len());
        for (date, bucket) in self.days {
            counts.push(DayCount {
                date: date.clone(),
                count: bucket.count,
            });
            hours.push(DayHours {
                date,
                hours: round2(bucket.hours.hours()),
            });
        }
        (counts, hours)
    }
}
