#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Building score record types, derived aggregates, and download events.
//!
//! Raw records arrive from the live `building_scores` feed as two time-point
//! scores plus a bounding box. Everything downstream (normalization,
//! aggregation, reconciliation, the download log) speaks in the types
//! defined here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Well-known store locations shared by the whole pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum StorePath {
    /// Live feed of raw building score records.
    #[strum(serialize = "building_scores")]
    BuildingScores,
    /// Last-write-wins `{ "total": n }` positive-count aggregate.
    #[strum(serialize = "count_marks_positive_score_diff")]
    PositiveCount,
    /// Historical per-day positive-count documents.
    #[strum(serialize = "chart")]
    DailyChart,
    /// Append-only log of mission-order downloads.
    #[strum(serialize = "downloads")]
    Downloads,
}

/// A raw building score record as pushed by the feed.
///
/// Not validated in any way: coordinates may lie outside the valid
/// geographic range and scores may be non-finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScoreRecord {
    pub bottom_lat: f64,
    pub bottom_lon: f64,
    pub top_lat: f64,
    pub top_lon: f64,
    /// Score at the earlier imagery date.
    pub score_date1: f64,
    /// Score at the later imagery date.
    pub score_date2: f64,
    pub score_diff: f64,
    /// Opaque tile identifier for the earlier imagery.
    #[serde(default)]
    pub tile_path_date1: Option<String>,
    /// Opaque tile identifier for the later imagery.
    #[serde(default)]
    pub tile_path_date2: Option<String>,
}

/// A record reduced to its representative point and score delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRecord {
    pub centroid_lat: f64,
    pub centroid_lng: f64,
    /// Unrounded score difference.
    pub delta: f64,
}

impl NormalizedRecord {
    /// Histogram bucket for this record: `floor(delta)`, rounding toward
    /// negative infinity so `-0.3` lands in bucket `-1`.
    ///
    /// Returns `None` when the delta is NaN or infinite.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bucket(&self) -> Option<i64> {
        if self.delta.is_finite() {
            Some(self.delta.floor() as i64)
        } else {
            None
        }
    }
}

/// Converts a raw record into its centroid and delta.
///
/// Total over any numeric input; garbage in, garbage out.
#[must_use]
pub fn normalize(raw: &RawScoreRecord) -> NormalizedRecord {
    NormalizedRecord {
        centroid_lat: f64::midpoint(raw.bottom_lat, raw.top_lat),
        centroid_lng: f64::midpoint(raw.bottom_lon, raw.top_lon),
        delta: raw.score_diff,
    }
}

/// Summary statistics recomputed from scratch on every ingestion cycle.
///
/// `histogram` only holds non-negative buckets and iterates in ascending
/// key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub total_marks: u64,
    pub positive_marks_total: u64,
    pub histogram: BTreeMap<i64, u64>,
}

/// The persisted shape of the positive-count aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositiveCount {
    pub total: u64,
}

/// A record that passed the positive-delta and zone filters, ready to be
/// placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Position of the record within the feed snapshot.
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub score_date1: f64,
    pub score_date2: f64,
    pub tile_path_date1: Option<String>,
    pub tile_path_date2: Option<String>,
    pub delta: f64,
}

/// Historical per-day aggregate document from the `chart` collection.
///
/// Several documents may share a date. Both fields are optional because
/// the collection is written by an external batch job, which labels the
/// day as `date` or `date_processed` (`date` wins when both are present)
/// and may store the count as a float (truncated toward zero).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredDailyDoc")]
pub struct DailyAggregateDoc {
    pub date: Option<String>,
    pub count_marks_positive_score_diff: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCount {
    Integer(i64),
    Float(f64),
}

#[derive(Deserialize)]
struct StoredDailyDoc {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_processed: Option<String>,
    #[serde(default)]
    count_marks_positive_score_diff: Option<StoredCount>,
}

impl From<StoredDailyDoc> for DailyAggregateDoc {
    #[allow(clippy::cast_possible_truncation)]
    fn from(stored: StoredDailyDoc) -> Self {
        Self {
            date: stored.date.or(stored.date_processed),
            count_marks_positive_score_diff: stored.count_marks_positive_score_diff.map(
                |count| match count {
                    StoredCount::Integer(n) => n,
                    StoredCount::Float(f) => f as i64,
                },
            ),
        }
    }
}

/// A date or timestamp that does not match its fixed textual pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    /// The rejected text.
    pub input: String,
    /// The pattern it was expected to match.
    pub pattern: &'static str,
}

impl std::fmt::Display for DateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' does not match {}", self.input, self.pattern)
    }
}

impl std::error::Error for DateParseError {}

/// One point of the reconciled daily series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// The date label exactly as stored.
    pub date: String,
    pub count: i64,
}

/// Date-ordered mapping of day to offset-adjusted positive count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    /// Looks up the adjusted count for a stored date label.
    #[must_use]
    pub fn get(&self, date: &str) -> Option<i64> {
        self.points
            .iter()
            .find(|p| p.date == date)
            .map(|p| p.count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A user-triggered export of a mission order for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEvent {
    /// Store-assigned document id. Never written into the document body.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub email: String,
    /// Local timestamp in `M/D/YYYY, hh:mm:ss AM|PM` form.
    #[serde(rename = "date")]
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(score_diff: f64) -> RawScoreRecord {
        RawScoreRecord {
            bottom_lat: 33.87,
            bottom_lon: 10.07,
            top_lat: 33.88,
            top_lon: 10.08,
            score_date1: 1.0,
            score_date2: 1.0 + score_diff,
            score_diff,
            tile_path_date1: None,
            tile_path_date2: None,
        }
    }

    #[test]
    fn normalize_takes_bounding_box_midpoint() {
        let n = normalize(&raw(2.5));
        assert!((n.centroid_lat - 33.875).abs() < 1e-9);
        assert!((n.centroid_lng - 10.075).abs() < 1e-9);
        assert!((n.delta - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_floors_toward_negative_infinity() {
        let cases = [
            (2.7, 2),
            (0.0, 0),
            (0.99, 0),
            (-0.3, -1),
            (-0.5, -1),
            (-1.0, -1),
            (-1.01, -2),
        ];
        for (delta, expected) in cases {
            assert_eq!(
                normalize(&raw(delta)).bucket(),
                Some(expected),
                "delta {delta}"
            );
        }
    }

    #[test]
    fn bucket_rejects_non_finite() {
        assert_eq!(normalize(&raw(f64::NAN)).bucket(), None);
        assert_eq!(normalize(&raw(f64::INFINITY)).bucket(), None);
    }

    #[test]
    fn raw_record_tolerates_missing_tile_paths() {
        let record: RawScoreRecord = serde_json::from_value(serde_json::json!({
            "bottom_lat": 1.0, "bottom_lon": 2.0, "top_lat": 3.0, "top_lon": 4.0,
            "score_date1": 0.5, "score_date2": 1.5, "score_diff": 1.0
        }))
        .unwrap();
        assert!(record.tile_path_date1.is_none());
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let mut snapshot = AggregateSnapshot {
            total_marks: 3,
            positive_marks_total: 1,
            ..AggregateSnapshot::default()
        };
        snapshot.histogram.insert(2, 1);
        snapshot.histogram.insert(0, 1);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["totalMarks"], 3);
        assert_eq!(value["positiveMarksTotal"], 1);
        assert_eq!(value["histogram"]["0"], 1);
    }

    #[test]
    fn daily_doc_accepts_processing_date_alias() {
        let doc: DailyAggregateDoc = serde_json::from_value(serde_json::json!({
            "date_processed": "1/2/2024",
            "count_marks_positive_score_diff": 335
        }))
        .unwrap();
        assert_eq!(doc.date.as_deref(), Some("1/2/2024"));
        assert_eq!(doc.count_marks_positive_score_diff, Some(335));
    }

    #[test]
    fn daily_doc_prefers_date_over_processing_date() {
        let doc: DailyAggregateDoc = serde_json::from_value(serde_json::json!({
            "date": "1/3/2024",
            "date_processed": "1/2/2024",
            "count_marks_positive_score_diff": 331
        }))
        .unwrap();
        assert_eq!(doc.date.as_deref(), Some("1/3/2024"));
    }

    #[test]
    fn daily_doc_truncates_float_counts() {
        let doc: DailyAggregateDoc = serde_json::from_value(serde_json::json!({
            "date": "1/2/2024",
            "count_marks_positive_score_diff": 335.0
        }))
        .unwrap();
        assert_eq!(doc.count_marks_positive_score_diff, Some(335));

        let doc: DailyAggregateDoc = serde_json::from_value(serde_json::json!({
            "date": "1/2/2024",
            "count_marks_positive_score_diff": 340.9
        }))
        .unwrap();
        assert_eq!(doc.count_marks_positive_score_diff, Some(340));
    }

    #[test]
    fn daily_doc_rejects_non_numeric_count() {
        let result = serde_json::from_value::<DailyAggregateDoc>(serde_json::json!({
            "date": "1/2/2024",
            "count_marks_positive_score_diff": "lots"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn download_event_omits_empty_id() {
        let event = DownloadEvent {
            id: String::new(),
            email: "a@b.c".to_string(),
            timestamp: "1/2/2024, 03:04:05 PM".to_string(),
            latitude: 1.0,
            longitude: 2.0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["date"], "1/2/2024, 03:04:05 PM");
    }

    #[test]
    fn date_parse_error_names_input_and_pattern() {
        let err = DateParseError {
            input: "yesterday".to_string(),
            pattern: "M/D/YYYY",
        };
        assert_eq!(err.to_string(), "'yesterday' does not match M/D/YYYY");
    }

    #[test]
    fn store_paths_use_deployment_names() {
        assert_eq!(StorePath::BuildingScores.as_ref(), "building_scores");
        assert_eq!(
            StorePath::PositiveCount.to_string(),
            "count_marks_positive_score_diff"
        );
        assert_eq!("chart".parse::<StorePath>().unwrap(), StorePath::DailyChart);
    }
}
