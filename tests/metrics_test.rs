use test_lab_dashboard::metrics::buckets::{bucket_for, Bucket};
use test_lab_dashboard::metrics::classify::classify;
use test_lab_dashboard::metrics::compute_metrics;
use test_lab_dashboard::records::fetch::SourceKind;
use test_lab_dashboard::records::{Rating, TestCategory, TestRecord, TypeFilter};

// 2024-01-01T00:00:00Z
const JAN_1: f64 = 1_704_067_200.0;
const DAY: f64 = 86_400.0;

fn mcb_trip(session: &str) -> TestRecord {
    let mut r = TestRecord::new("mcb_trip_test", session, JAN_1, 120.0);
    r.rating = Some(Rating::Text("B16".to_string()));
    r.multiplier = Some(5.0);
    r.trip_time = Some(0.08);
    r.upper_limit = Some(0.1);
    r
}

#[test]
fn test_classify_total_over_arbitrary_inputs() {
    let inputs = ["", " ", "???", "mcb", "MCB TRIP", "rcd value", "rcd time", "Ünïcödé rcd trip"];
    for input in inputs {
        let category = classify(input);
        assert!(TestCategory::ALL.contains(&category), "{:?}", input);
    }
    assert_eq!(classify(""), TestCategory::RcdTripTime);
    assert_eq!(classify("Ünïcödé rcd trip"), TestCategory::RcdTripTime);
}

#[test]
fn test_duplicate_rows_count_twice_hours_once() {
    let mut first = TestRecord::new("rcd_trip_time", "s1", JAN_1, 1800.0);
    first.id = Some("a".to_string());
    let mut second = first.clone();
    second.id = Some("b".to_string());

    let metrics = compute_metrics(&[first, second], &TypeFilter::All, SourceKind::Database);
    assert_eq!(metrics.total_tests, 2);
    assert_eq!(metrics.total_hours, 0.5);
    assert_eq!(metrics.tests_per_day[0].count, 2);
    assert_eq!(metrics.hours_per_day[0].hours, 0.5);
}

#[test]
fn test_bucket_partition_edges() {
    assert_eq!(bucket_for(100.0), Some(Bucket::B100To200));
    assert_eq!(bucket_for(400.0), Some(Bucket::B300To400));
    assert_eq!(bucket_for(450.0), None);
}

#[test]
fn test_currents_land_in_buckets_through_engine() {
    let mut records = Vec::new();
    for (rating, multiplier) in [("B20", 5.0), ("C40", 10.0), ("B45", 10.0)] {
        let mut r = TestRecord::new("mcb_trip_test", rating, JAN_1, 60.0);
        r.rating = Some(Rating::Text(rating.to_string()));
        r.multiplier = Some(multiplier);
        records.push(r);
    }

    let metrics = compute_metrics(&records, &TypeFilter::All, SourceKind::Database);
    let buckets = metrics.mcb_current_buckets.unwrap();
    assert_eq!(buckets.get(Bucket::B100To200), 1);
    assert_eq!(buckets.get(Bucket::B300To400), 1);
    assert_eq!(buckets.get(Bucket::B50To100), 0);

    // 450 A is out of every bucket but is still the maximum
    let max = metrics.mcb_max_current.unwrap();
    assert_eq!(max.value, 450.0);
    assert_eq!(max.count, 1);
}

#[test]
fn test_sentinel_limits_never_averaged() {
    let mut mcb = mcb_trip("s1");
    mcb.upper_limit = Some(1e15);
    let mut rcd = TestRecord::new("rcd_trip_time_sinusoidal", "s2", JAN_1, 60.0);
    rcd.trip_time = Some(0.02);
    rcd.upper_limit = Some(1e15);

    let metrics = compute_metrics(&[mcb, rcd], &TypeFilter::All, SourceKind::Database);
    assert!(metrics.mcb_performance.is_none());
    assert!(metrics.rcd_performance.is_none());
}

#[test]
fn test_per_day_series_ascending() {
    let records = vec![
        TestRecord::new("rcd_trip", "a", JAN_1 + 2.0 * DAY, 60.0),
        TestRecord::new("rcd_trip", "b", JAN_1, 60.0),
        TestRecord::new("rcd_trip", "c", JAN_1 + DAY, 60.0),
    ];
    let metrics = compute_metrics(&records, &TypeFilter::All, SourceKind::Database);

    let dates: Vec<&str> = metrics.tests_per_day.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    let hour_dates: Vec<&str> = metrics.hours_per_day.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(hour_dates, dates);
}

#[test]
fn test_end_to_end_duplicate_mcb_session() {
    let records = vec![mcb_trip("s1"), mcb_trip("s1")];
    let metrics = compute_metrics(&records, &TypeFilter::All, SourceKind::Database);

    assert_eq!(metrics.total_tests, 2);
    assert_eq!(metrics.total_hours, 0.03);
    assert_eq!(metrics.mcb_current_buckets.as_ref().unwrap().get(Bucket::B50To100), 2);

    let short_circuit = metrics
        .mcb_performance
        .as_ref()
        .and_then(|p| p.short_circuit.as_ref())
        .unwrap();
    assert_eq!(short_circuit.tests_with_data, 2);
    assert_eq!(short_circuit.average_speed_improvement, 20.0);

    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["mcbCurrentBuckets"]["50-100"], 2);
    assert_eq!(json["mcbPerformance"]["shortCircuit"]["averageSpeedImprovement"], 20.0);
    assert!(json["mcbPerformance"].get("regularTrip").is_none());
    assert_eq!(json["mcbTripTimeSeries"][0]["label"], "16A × 5");
}
