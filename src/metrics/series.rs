use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::extract::{resolve_multiplier, resolve_rating};
use crate::records::TestRecord;

/// Trip times over time for one rating × multiplier combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripTimeSeries {
    pub id: String,
    pub rating: f64,
    pub multiplier: f64,
    pub label: String,
    pub points: Vec<TripTimePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripTimePoint {
    pub date: String,
    pub trip_time: f64,
}

#[derive(Debug)]
struct Combination {
    rating: f64,
    multiplier: f64,
    by_date: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
pub struct TripTimeSeriesBuilder {
    combos: HashMap<String, Combination>,
}

impl TripTimeSeriesBuilder {
    /// Records without a trip time, rating or multiplier are skipped. A later
    /// record for the same combination and date replaces the earlier point.
    pub fn add(&mut self, record: &TestRecord) {
        let Some(trip_time) = record.trip_time.filter(|t| t.is_finite()) else {
            return;
        };
        let (Some(rating), Some(multiplier)) = (resolve_rating(record), resolve_multiplier(record))
        else {
            return;
        };
        let Some(started_at) = record.started_at() else {
            return;
        };

        let id = format!("{}-{}", rating, multiplier);
        let combo = self.combos.entry(id).or_insert_with(|| Combination {
            rating,
            multiplier,
            by_date: BTreeMap::new(),
        });
        combo
            .by_date
            .insert(started_at.format("%Y-%m-%d").to_string(), trip_time);
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Combinations sorted by label, points ascending by date.
    pub fn finish(self) -> Vec<TripTimeSeries> {
        let mut series: Vec<TripTimeSeries> = self
            .combos
            .into_iter()
            .map(|(id, combo)| TripTimeSeries {
                label: format!("{}A × {}", combo.rating, combo.multiplier),
                id,
                rating: combo.rating,
                multiplier: combo.multiplier,
                points: combo
                    .by_date
                    .into_iter()
                    .map(|(date, trip_time)| TripTimePoint { date, trip_time })
                    .collect(),
            })
            .collect();
        series.sort_by(|a, b| a.label.cmp(&b.label));
        series
    }
}
