use serde::Serialize;

use crate::records::{TestCategory, TestRecord};

/// Limits at or above this are "no limit" sentinels from the rig.
pub const MAX_PLAUSIBLE_LIMIT: f64 = 1e10;

/// MCB upper limit that marks a short-circuit (instantaneous) trip test.
pub const SHORT_CIRCUIT_LIMIT: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceGroup {
    /// Mean percentage by which the measurement beat its upper limit, 1 dp.
    pub average_speed_improvement: f64,
    pub tests_with_data: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McbPerformance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_circuit: Option<PerformanceGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_trip: Option<PerformanceGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RcdPerformance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_a: Option<PerformanceGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_b: Option<PerformanceGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcdType {
    /// Sinusoidal residual current.
    A,
    /// Composite, pulsating or smooth DC residual current.
    B,
}

pub fn rcd_type(name: &str) -> Option<RcdType> {
    let name = name.to_lowercase();
    if name.contains("sinusoidal") {
        Some(RcdType::A)
    } else if ["composite", "pulsating", "smooth"]
        .iter()
        .any(|k| name.contains(k))
    {
        Some(RcdType::B)
    } else {
        None
    }
}

/// `(limit - measurement) / limit * 100`, or `None` when the limit is not
/// in `(0, 1e10)` or either value is not finite.
pub fn speed_improvement(measurement: f64, upper_limit: f64) -> Option<f64> {
    if !measurement.is_finite() || !(upper_limit > 0.0 && upper_limit < MAX_PLAUSIBLE_LIMIT) {
        return None;
    }
    Some((upper_limit - measurement) / upper_limit * 100.0)
}

/// The trip measurement compared against the upper limit for a category.
pub fn measurement_for(record: &TestRecord, category: TestCategory) -> Option<f64> {
    match category {
        TestCategory::McbTripTime => record.trip_time,
        TestCategory::RcdTripTime => record.trip_time.or(record.trip_value),
        TestCategory::RcdTripValue => record.trip_value.or(record.trip_time),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Running mean accumulator for one sub-group.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    sum: f64,
    count: u64,
}

impl GroupAccumulator {
    pub fn push(&mut self, improvement: f64) {
        self.sum += improvement;
        self.count += 1;
    }

    /// Empty groups produce nothing, never a zero average.
    pub fn finish(self) -> Option<PerformanceGroup> {
        if self.count == 0 {
            return None;
        }
        Some(PerformanceGroup {
            average_speed_improvement: round1(self.sum / self.count as f64),
            tests_with_data: self.count,
        })
    }
}

#[derive(Debug, Default)]
pub struct PerformanceAggregator {
    short_circuit: GroupAccumulator,
    regular_trip: GroupAccumulator,
    type_a: GroupAccumulator,
    type_b: GroupAccumulator,
}

impl PerformanceAggregator {
    pub fn observe(&mut self, record: &TestRecord, category: TestCategory) {
        let Some(measurement) = measurement_for(record, category) else {
            return;
        };
        let Some(upper_limit) = record.upper_limit else {
            return;
        };
        let Some(improvement) = speed_improvement(measurement, upper_limit) else {
            return;
        };

        match category {
            TestCategory::McbTripTime => {
                if (upper_limit - SHORT_CIRCUIT_LIMIT).abs() < 1e-9 {
                    self.short_circuit.push(improvement);
                } else {
                    self.regular_trip.push(improvement);
                }
            }
            TestCategory::RcdTripTime | TestCategory::RcdTripValue => match rcd_type(&record.name) {
                Some(RcdType::A) => self.type_a.push(improvement),
                Some(RcdType::B) => self.type_b.push(improvement),
                None => {}
            },
        }
    }

    pub fn finish(self) -> (Option<McbPerformance>, Option<RcdPerformance>) {
        let short_circuit = self.short_circuit.finish();
        let regular_trip = self.regular_trip.finish();
        let mcb = (short_circuit.is_some() || regular_trip.is_some()).then_some(McbPerformance {
            short_circuit,
            regular_trip,
        });

        let type_a = self.type_a.finish();
        let type_b = self.type_b.finish();
        let rcd = (type_a.is_some() || type_b.is_some()).then_some(RcdPerformance { type_a, type_b });

        (mcb, rcd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcb(trip_time: f64, upper_limit: f64) -> TestRecord {
        let mut r = TestRecord::new("mcb_trip", "s", 0.0, 1.0);
        r.trip_time = Some(trip_time);
        r.upper_limit = Some(upper_limit);
        r
    }

    fn rcd(name: &str, trip_value: f64, upper_limit: f64) -> TestRecord {
        let mut r = TestRecord::new(name, "s", 0.0, 1.0);
        r.trip_value = Some(trip_value);
        r.upper_limit = Some(upper_limit);
        r
    }

    #[test]
    fn test_speed_improvement_formula() {
        let value = speed_improvement(0.08, 0.1).unwrap();
        assert!((value - 20.0).abs() < 1e-9);
        assert!(speed_improvement(12.0, 10.0).unwrap() < 0.0);
    }

    #[test]
    fn test_speed_improvement_rejects_implausible_limits() {
        assert_eq!(speed_improvement(0.1, 0.0), None);
        assert_eq!(speed_improvement(0.1, -1.0), None);
        assert_eq!(speed_improvement(0.1, 1e10), None);
        assert_eq!(speed_improvement(0.1, 1e15), None);
        assert_eq!(speed_improvement(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_mcb_split_by_limit() {
        let mut agg = PerformanceAggregator::default();
        agg.observe(&mcb(0.08, 0.1), TestCategory::McbTripTime);
        agg.observe(&mcb(5.0, 10.0), TestCategory::McbTripTime);
        agg.observe(&mcb(2.0, 10.0), TestCategory::McbTripTime);
        agg.observe(&mcb(2.0, 1e15), TestCategory::McbTripTime);

        let (mcb_perf, rcd_perf) = agg.finish();
        let mcb_perf = mcb_perf.unwrap();
        let sc = mcb_perf.short_circuit.unwrap();
        assert_eq!(sc.tests_with_data, 1);
        assert_eq!(sc.average_speed_improvement, 20.0);
        let regular = mcb_perf.regular_trip.unwrap();
        assert_eq!(regular.tests_with_data, 2);
        assert_eq!(regular.average_speed_improvement, 65.0);
        assert!(rcd_perf.is_none());
    }

    #[test]
    fn test_rcd_split_by_keyword() {
        let mut agg = PerformanceAggregator::default();
        agg.observe(&rcd("rcd_trip_value_sinusoidal", 20.0, 30.0), TestCategory::RcdTripValue);
        agg.observe(&rcd("rcd_trip_value_smooth", 45.0, 60.0), TestCategory::RcdTripValue);
        agg.observe(&rcd("rcd_trip_value_pulsating", 30.0, 60.0), TestCategory::RcdTripValue);
        agg.observe(&rcd("rcd_trip_value", 10.0, 30.0), TestCategory::RcdTripValue);

        let (mcb_perf, rcd_perf) = agg.finish();
        assert!(mcb_perf.is_none());
        let rcd_perf = rcd_perf.unwrap();
        let a = rcd_perf.type_a.unwrap();
        assert_eq!(a.tests_with_data, 1);
        assert_eq!(a.average_speed_improvement, 33.3);
        let b = rcd_perf.type_b.unwrap();
        assert_eq!(b.tests_with_data, 2);
        assert_eq!(b.average_speed_improvement, 37.5);
    }

    #[test]
    fn test_empty_groups_are_absent() {
        let mut agg = PerformanceAggregator::default();
        agg.observe(&mcb(0.05, 0.1), TestCategory::McbTripTime);
        let (mcb_perf, _) = agg.finish();
        let mcb_perf = mcb_perf.unwrap();
        assert!(mcb_perf.regular_trip.is_none());

        let json = serde_json::to_value(&mcb_perf).unwrap();
        assert!(json.get("shortCircuit").is_some());
        assert!(json.get("regularTrip").is_none());
    }

    #[test]
    fn test_measurement_fallbacks() {
        let mut r = TestRecord::new("rcd_trip_time", "s", 0.0, 1.0);
        r.trip_value = Some(0.02);
        assert_eq!(measurement_for(&r, TestCategory::RcdTripTime), Some(0.02));
        assert_eq!(measurement_for(&r, TestCategory::McbTripTime), None);
    }
}
