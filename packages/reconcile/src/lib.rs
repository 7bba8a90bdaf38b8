#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Daily reconciliation of historical positive counts.
//!
//! The `chart` collection holds one or more documents per processing day,
//! each carrying the raw positive count of that run. The reconciled series
//! subtracts a fixed baseline [`OFFSET`] from every document, sums per
//! date, and orders the result by calendar date.

use std::collections::BTreeMap;
use std::sync::Arc;

use building_watch_score_models::{
    DailyAggregateDoc, DateParseError, StorePath, TimeSeries, TimeSeriesPoint,
};
use building_watch_store::{DocumentStore, StoreError};
use chrono::NaiveDate;

/// Baseline subtracted from every daily document's raw count.
pub const OFFSET: i64 = 330;

/// Accepted daily date pattern, for error messages.
pub const DAILY_DATE_PATTERN: &str = "M/D/YYYY or YYYY-MM-DD";

/// Parses a daily date label (`1/2/2024`, `01/02/2024`, or `2024-01-02`).
///
/// # Errors
///
/// Returns [`DateParseError`] if the label matches neither form.
pub fn parse_daily_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| DateParseError {
            input: s.to_string(),
            pattern: DAILY_DATE_PATTERN,
        })
}

/// Builds the adjusted series with the standard [`OFFSET`].
#[must_use]
pub fn reconcile(docs: &[DailyAggregateDoc]) -> TimeSeries {
    reconcile_with_offset(docs, OFFSET)
}

/// Builds the adjusted series.
///
/// Every document contributes `count - offset` to its date. A document
/// without a count contributes nothing but still makes its date appear.
/// Documents whose date is missing or unparsable, or whose count would
/// overflow the per-date sum, are skipped.
#[must_use]
pub fn reconcile_with_offset(docs: &[DailyAggregateDoc], offset: i64) -> TimeSeries {
    let mut by_date: BTreeMap<(NaiveDate, &str), i64> = BTreeMap::new();
    let mut skipped = 0usize;

    for doc in docs {
        let Some(label) = doc.date.as_deref() else {
            log::warn!("Skipping daily document without a date");
            skipped += 1;
            continue;
        };
        let day = match parse_daily_date(label) {
            Ok(day) => day,
            Err(e) => {
                log::warn!("Skipping daily document: {e}");
                skipped += 1;
                continue;
            }
        };

        let key = (day, label);
        let adjusted = doc
            .count_marks_positive_score_diff
            .map_or(Some(0), |count| count.checked_sub(offset));
        let total = adjusted.and_then(|a| a.checked_add(by_date.get(&key).copied().unwrap_or(0)));
        let Some(total) = total else {
            log::warn!("Skipping daily document for {label}: count out of range");
            skipped += 1;
            continue;
        };
        by_date.insert(key, total);
    }

    log::info!(
        "Reconciled {} daily documents into {} dates ({skipped} skipped)",
        docs.len() - skipped,
        by_date.len()
    );

    TimeSeries {
        points: by_date
            .into_iter()
            .map(|((_, label), count)| TimeSeriesPoint {
                date: label.to_string(),
                count,
            })
            .collect(),
    }
}

/// One-shot reader of the `chart` collection.
///
/// Each call to [`DailyReconciler::run`] reads the collection once; later
/// changes to the collection are not observed until the next call.
pub struct DailyReconciler {
    store: Arc<dyn DocumentStore>,
    offset: i64,
}

impl DailyReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            offset: OFFSET,
        }
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Reads every daily document and reconciles them.
    ///
    /// Documents that are not objects of the expected shape are skipped
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the collection cannot be read.
    pub async fn run(&self) -> Result<TimeSeries, StoreError> {
        let collection = StorePath::DailyChart.as_ref();
        let docs: Vec<DailyAggregateDoc> = self
            .store
            .list(collection)
            .await?
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc.data) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    log::warn!("Skipping malformed {collection} document {}: {e}", doc.id);
                    None
                }
            })
            .collect();

        Ok(reconcile_with_offset(&docs, self.offset))
    }
}

#[cfg(test)]
mod tests {
    use building_watch_store::memory::MemoryStore;

    use super::*;

    fn doc(date: &str, count: i64) -> DailyAggregateDoc {
        DailyAggregateDoc {
            date: Some(date.to_string()),
            count_marks_positive_score_diff: Some(count),
        }
    }

    #[test]
    fn sums_documents_sharing_a_date() {
        let series = reconcile(&[doc("1/2/2024", 335), doc("1/2/2024", 340)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("1/2/2024"), Some(15));
    }

    #[test]
    fn per_date_sum_subtracts_offset_per_document() {
        let counts = [331, 400, 290, 330, 1000];
        let docs: Vec<_> = counts.iter().map(|c| doc("3/4/2024", *c)).collect();
        let series = reconcile(&docs);

        let expected = counts.iter().sum::<i64>() - OFFSET * i64::try_from(counts.len()).unwrap();
        assert_eq!(series.get("3/4/2024"), Some(expected));
    }

    #[test]
    fn orders_by_calendar_date_not_text() {
        let series = reconcile(&[
            doc("10/1/2024", 331),
            doc("2/1/2024", 332),
            doc("12/31/2023", 333),
            doc("2/10/2024", 334),
        ]);
        let dates: Vec<&str> = series.points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["12/31/2023", "2/1/2024", "2/10/2024", "10/1/2024"]);
    }

    #[test]
    fn skips_missing_and_malformed_dates() {
        let docs = [
            doc("not a date", 400),
            DailyAggregateDoc {
                date: None,
                count_marks_positive_score_diff: Some(400),
            },
            doc("1/5/2024", 331),
        ];
        let series = reconcile(&docs);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("1/5/2024"), Some(1));
    }

    #[test]
    fn missing_count_contributes_nothing() {
        let series = reconcile(&[
            DailyAggregateDoc {
                date: Some("1/6/2024".to_string()),
                count_marks_positive_score_diff: None,
            },
            doc("1/6/2024", 333),
        ]);
        assert_eq!(series.get("1/6/2024"), Some(3));
    }

    #[test]
    fn extreme_counts_are_skipped_not_fatal() {
        let series = reconcile(&[doc("1/2/2024", i64::MIN), doc("1/3/2024", 400)]);
        assert_eq!(series.get("1/2/2024"), None);
        assert_eq!(series.get("1/3/2024"), Some(70));

        let series = reconcile(&[doc("1/4/2024", i64::MAX), doc("1/4/2024", i64::MAX)]);
        assert_eq!(series.get("1/4/2024"), Some(i64::MAX - OFFSET));
    }

    #[test]
    fn parses_padded_unpadded_and_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_daily_date("1/2/2024").unwrap(), expected);
        assert_eq!(parse_daily_date("01/02/2024").unwrap(), expected);
        assert_eq!(parse_daily_date("2024-01-02").unwrap(), expected);
        assert!(parse_daily_date("13/45/2024").is_err());
    }

    #[tokio::test]
    async fn reads_chart_collection_once() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "chart",
                [
                    ("a".to_string(), serde_json::json!({"date_processed": "1/2/2024", "count_marks_positive_score_diff": 335})),
                    ("b".to_string(), serde_json::json!({"date_processed": "1/2/2024", "count_marks_positive_score_diff": 340})),
                    ("c".to_string(), serde_json::json!("not an object")),
                ],
            )
            .await;

        let reconciler = DailyReconciler::new(store.clone());
        let series = reconciler.run().await.unwrap();
        assert_eq!(series.get("1/2/2024"), Some(15));

        let custom = DailyReconciler::new(store).with_offset(0).run().await.unwrap();
        assert_eq!(custom.get("1/2/2024"), Some(675));
    }
}
