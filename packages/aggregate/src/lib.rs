#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Score delta histogram and in-zone positive count aggregation.
//!
//! [`aggregate`] is a pure function from a feed snapshot to an
//! [`AggregateSnapshot`]. The stateful [`aggregator::Aggregator`] holds the
//! latest snapshot and owns the persistence side effect.

pub mod aggregator;

use building_watch_geofence::engine::{ContainmentEngine, RayCasting};
use building_watch_geofence::{LatLng, MonitoringPolygon};
use building_watch_score_models::{AggregateSnapshot, Marker, RawScoreRecord, normalize};
use building_watch_store::json_kind;
use serde_json::Value;

pub use aggregator::Aggregator;

/// A feed payload that cannot be aggregated.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The payload is not an ordered collection.
    #[error("expected an array of score records, found {found}")]
    NotACollection {
        /// JSON kind that arrived instead.
        found: &'static str,
    },

    /// An element of the collection is not a score record.
    #[error("record {index} is malformed: {source}")]
    InvalidRecord {
        /// Position within the payload.
        index: usize,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

/// Decodes a feed payload into records, keeping each record's position.
///
/// `null` elements are holes left by deleted entries in the live feed and
/// are skipped. Any other element that does not decode aborts the whole
/// payload.
///
/// # Errors
///
/// Returns [`FormatError`] if the payload is not an array or one of its
/// elements is not a score record.
pub fn decode_snapshot(payload: &Value) -> Result<Vec<(usize, RawScoreRecord)>, FormatError> {
    let Value::Array(items) = payload else {
        return Err(FormatError::NotACollection {
            found: json_kind(payload),
        });
    };

    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_null())
        .map(|(index, item)| {
            serde_json::from_value::<RawScoreRecord>(item.clone())
                .map(|record| (index, record))
                .map_err(|source| FormatError::InvalidRecord { index, source })
        })
        .collect()
}

/// Recomputes the aggregate for a whole snapshot using the built-in
/// ray-casting test.
#[must_use]
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a RawScoreRecord>,
    polygon: &MonitoringPolygon,
) -> AggregateSnapshot {
    aggregate_with(records, polygon, &RayCasting)
}

/// Recomputes the aggregate for a whole snapshot.
///
/// Every record counts toward `total_marks`. Records whose floored delta
/// is non-negative land in the histogram. Records with a strictly
/// positive (unrounded) delta whose centroid lies inside `polygon` count
/// toward `positive_marks_total`.
#[must_use]
pub fn aggregate_with<'a>(
    records: impl IntoIterator<Item = &'a RawScoreRecord>,
    polygon: &MonitoringPolygon,
    engine: &dyn ContainmentEngine,
) -> AggregateSnapshot {
    let mut snapshot = AggregateSnapshot::default();

    for raw in records {
        let record = normalize(raw);
        snapshot.total_marks += 1;

        if let Some(bucket) = record.bucket().filter(|b| *b >= 0) {
            *snapshot.histogram.entry(bucket).or_insert(0) += 1;
        }

        if record.delta > 0.0
            && engine.contains(
                LatLng::new(record.centroid_lat, record.centroid_lng),
                polygon,
            )
        {
            snapshot.positive_marks_total += 1;
        }
    }

    snapshot
}

/// Selects the records that count toward `positive_marks_total`, as map
/// markers.
#[must_use]
pub fn positive_markers(
    records: &[(usize, RawScoreRecord)],
    polygon: &MonitoringPolygon,
    engine: &dyn ContainmentEngine,
) -> Vec<Marker> {
    records
        .iter()
        .filter_map(|(index, raw)| {
            let record = normalize(raw);
            let centroid = LatLng::new(record.centroid_lat, record.centroid_lng);
            (record.delta > 0.0 && engine.contains(centroid, polygon)).then(|| Marker {
                id: index.to_string(),
                latitude: centroid.lat,
                longitude: centroid.lng,
                score_date1: raw.score_date1,
                score_date2: raw.score_date2,
                tile_path_date1: raw.tile_path_date1.clone(),
                tile_path_date2: raw.tile_path_date2.clone(),
                delta: record.delta,
            })
        })
        .collect()
}
