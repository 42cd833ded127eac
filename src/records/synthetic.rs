use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use super::fetch::{RecordSource, SourceError, SourceKind};
use super::{Outcome, Rating, RecordQuery, TestCondition, TestRecord};
use crate::config::DEFAULT_WINDOW_DAYS;

const WINDOW_SECS: f64 = DEFAULT_WINDOW_DAYS as f64 * 86_400.0;
const RCD_WAVEFORMS: [&str; 4] = ["sinusoidal", "composite", "pulsating", "smooth"];
const MCB_CURVES: [char; 3] = ['B', 'C', 'D'];
const MCB_RATINGS: [u32; 5] = [6, 10, 16, 20, 32];
// (multiplier, upper limit in seconds); 1e15 marks a no-trip test
const MCB_POINTS: [(f64, f64); 4] = [(1.13, 1e15), (2.55, 60.0), (5.0, 0.1), (10.0, 0.1)];

/// Deterministic stand-in for the database. The same seed and query always
/// produce the same records, spread over the window that ends at the query end.
pub struct SyntheticSource {
    seed: u64,
    count: usize,
}

impl SyntheticSource {
    pub fn new(seed: u64, count: usize) -> Self {
        Self { seed, count }
    }

    pub fn generate(&self, query: &RecordQuery) -> Vec<TestRecord> {
        let end = query.to_epoch();
        let mut rng = StdRng::seed_from_u64(self.seed ^ end.to_bits());
        let mut records = Vec::with_capacity(self.count + self.count / 10);

        for i in 0..self.count {
            let start = end - rng.gen_range(0.0..WINDOW_SECS);
            let duration = rng.gen_range(10.0..310.0);
            let session = format!("session_{}", i / 3);
            let mut record = match rng.gen_range(0..4) {
                0 => meter_record(&mut rng, &session, start, duration),
                1 => rcd_record(&mut rng, &session, start, duration),
                _ => mcb_record(&mut rng, &session, start, duration),
            };
            record.id = Some(format!("mock_{}", i));
            record
                .extra
                .insert("document_type".to_string(), Value::from("function_metadata"));

            // Every tenth session is re-synced and shows up twice
            if i % 10 == 0 {
                let mut duplicate = record.clone();
                duplicate.id = Some(format!("mock_{}_dup", i));
                records.push(duplicate);
            }
            records.push(record);
        }

        records.retain(|r| query.matches(r));
        records.sort_by(|a, b| a.start.total_cmp(&b.start));
        records
    }
}

impl RecordSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn query(&self, query: &RecordQuery) -> Result<Vec<TestRecord>, SourceError> {
        Ok(self.generate(query))
    }
}

fn set_outcome(record: &mut TestRecord, outcome: Outcome) {
    record.outcome = Some(outcome);
    record.passed = outcome == Outcome::Passed;
    record.failed = outcome == Outcome::Failed;
    record.skipped = outcome == Outcome::Skipped;
    record.error = outcome == Outcome::Error;
}

fn random_outcome(rng: &mut StdRng) -> Outcome {
    match rng.gen_range(0..10) {
        0..=6 => Outcome::Passed,
        7 | 8 => Outcome::Failed,
        _ => Outcome::Skipped,
    }
}

fn meter_record(rng: &mut StdRng, session: &str, start: f64, duration: f64) -> TestRecord {
    let meter = if rng.gen_bool(0.5) { "decabit" } else { "telenerg" };
    let command = rng.gen_range(0..10);
    let amplitude: f64 = rng.gen_range(0.0..2.0);
    let frequency = rng.gen_range(0..500);
    let name = format!(
        "test_{}[CMD{}_{:.1}%_{}Hz_On]",
        meter, command, amplitude, frequency
    );

    let mut record = TestRecord::new(name, session, start, duration);
    record.originalname = format!("test_{}", meter);
    record.condition = Some(TestCondition {
        command: Some(command as f64),
        amplitude: Some(amplitude),
        frequency: Some(frequency as f64),
        state: Some("On".to_string()),
    });
    let outcome = random_outcome(rng);
    set_outcome(&mut record, outcome);
    record
}

fn rcd_record(rng: &mut StdRng, session: &str, start: f64, duration: f64) -> TestRecord {
    let waveform = RCD_WAVEFORMS[rng.gen_range(0..RCD_WAVEFORMS.len())];
    let by_value = rng.gen_bool(0.5);
    let name = if by_value {
        format!("test_rcd_trip_value_{}", waveform)
    } else {
        format!("test_rcd_trip_time_{}", waveform)
    };

    let mut record = TestRecord::new(name, session, start, duration);
    record.originalname = if by_value {
        "test_rcd_trip_value".to_string()
    } else {
        "test_rcd_trip_time".to_string()
    };

    // Trip value in mA against a 30 mA device, trip time in s against 0.3 s
    let limit = if by_value { 30.0 } else { 0.3 };
    let measured = limit * rng.gen_range(0.4..1.1);
    if by_value {
        record.trip_value = Some(measured);
    } else {
        record.trip_time = Some(measured);
    }
    record.upper_limit = Some(limit);

    let outcome = if measured <= limit {
        Outcome::Passed
    } else {
        Outcome::Failed
    };
    set_outcome(&mut record, outcome);
    record
}

fn mcb_record(rng: &mut StdRng, session: &str, start: f64, duration: f64) -> TestRecord {
    let curve = MCB_CURVES[rng.gen_range(0..MCB_CURVES.len())];
    let rating = MCB_RATINGS[rng.gen_range(0..MCB_RATINGS.len())];
    let (multiplier, upper_limit) = MCB_POINTS[rng.gen_range(0..MCB_POINTS.len())];
    let name = format!("test_mcb_trip_time[{}{}_{}x]", curve, rating, multiplier);

    let mut record = TestRecord::new(name, session, start, duration);
    record.originalname = "test_mcb_trip_time".to_string();
    record.rating = Some(Rating::Text(format!("{}{}", curve, rating)));
    // Half the rigs report the multiplier only in the test name
    if rng.gen_bool(0.5) {
        record.multiplier = Some(multiplier);
    }
    record.upper_limit = Some(upper_limit);

    let outcome = if upper_limit >= 1e10 {
        // No-trip test: the breaker must hold, so there is no trip time
        Outcome::Passed
    } else {
        let trip_time = upper_limit * rng.gen_range(0.3..1.05);
        record.trip_time = Some(trip_time);
        if trip_time <= upper_limit {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    };
    set_outcome(&mut record, outcome);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::classify::classify;
    use crate::records::{LegacyTestType, TestCategory, TypeFilter};
    use chrono::DateTime;

    fn query(filter: TypeFilter) -> RecordQuery {
        let to = DateTime::from_timestamp(1_706_745_600, 0).unwrap();
        let from = to - chrono::Duration::days(30);
        RecordQuery::new(from, to, filter)
    }

    #[test]
    fn test_generation_is_deterministic() {
        let source = SyntheticSource::new(42, 100);
        let a = source.generate(&query(TypeFilter::All));
        let b = source.generate(&query(TypeFilter::All));
        assert_eq!(a, b);
        assert!(a.len() >= 100);
    }

    #[test]
    fn test_records_respect_query() {
        let source = SyntheticSource::new(42, 100);
        let q = query(TypeFilter::Legacy(LegacyTestType::Mcb));
        let records = source.generate(&q);
        assert!(!records.is_empty());
        for r in &records {
            assert!(q.matches(r));
            assert_eq!(classify(&r.name), TestCategory::McbTripTime);
        }
        assert!(records.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_contains_duplicate_sessions() {
        let records = SyntheticSource::new(1, 50).generate(&query(TypeFilter::All));
        let dupes = records
            .iter()
            .filter(|r| r.id.as_deref().is_some_and(|id| id.ends_with("_dup")))
            .count();
        assert!(dupes > 0);
    }
}
