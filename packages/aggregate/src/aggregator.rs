//! Holder of the latest aggregate and its persistence side effect.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use building_watch_geofence::MonitoringPolygon;
use building_watch_geofence::engine::{ContainmentEngine, RayCasting};
use building_watch_score_models::{AggregateSnapshot, PositiveCount, StorePath};
use building_watch_store::DocumentStore;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::{aggregate_with, decode_snapshot};

/// Recomputes the aggregate for each feed payload and keeps only the
/// newest result.
///
/// The current snapshot is published through a [`watch`] channel so
/// readers always see a complete snapshot. A payload that fails to decode
/// leaves the previous snapshot in place.
///
/// Persistence writes are sequenced: a write that starts after a newer
/// one has landed is dropped, so the stored total always reflects the
/// newest snapshot that was written.
pub struct Aggregator {
    store: Arc<dyn DocumentStore>,
    polygon: MonitoringPolygon,
    engine: Arc<dyn ContainmentEngine>,
    current: watch::Sender<AggregateSnapshot>,
    next_write: AtomicU64,
    last_written: Arc<Mutex<u64>>,
}

impl Aggregator {
    /// Creates an aggregator using the built-in ray-casting test.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, polygon: MonitoringPolygon) -> Self {
        let (current, _) = watch::channel(AggregateSnapshot::default());
        Self {
            store,
            polygon,
            engine: Arc::new(RayCasting),
            current,
            next_write: AtomicU64::new(0),
            last_written: Arc::new(Mutex::new(0)),
        }
    }

    /// Swaps the containment engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ContainmentEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub const fn polygon(&self) -> &MonitoringPolygon {
        &self.polygon
    }

    /// The most recent snapshot (all zeros before the first cycle).
    #[must_use]
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.current.borrow().clone()
    }

    /// A receiver that observes every replaced snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AggregateSnapshot> {
        self.current.subscribe()
    }

    /// Recomputes the aggregate from a full feed payload and makes it
    /// current.
    ///
    /// Returns `None` (and keeps the previous snapshot) if the payload is
    /// not a collection of score records.
    pub fn process(&self, payload: &Value) -> Option<AggregateSnapshot> {
        let records = match decode_snapshot(payload) {
            Ok(records) => records,
            Err(e) => {
                log::error!("Data format is not as expected, keeping previous aggregate: {e}");
                return None;
            }
        };

        let snapshot = aggregate_with(
            records.iter().map(|(_, r)| r),
            &self.polygon,
            self.engine.as_ref(),
        );
        log::info!(
            "Aggregated {} marks ({} positive in zone, {} histogram buckets)",
            snapshot.total_marks,
            snapshot.positive_marks_total,
            snapshot.histogram.len()
        );

        self.current.send_replace(snapshot.clone());
        Some(snapshot)
    }

    /// Overwrites the persisted positive count with this snapshot's value.
    ///
    /// The write runs in the background and is never retried; failures are
    /// logged. The returned handle may be awaited or dropped.
    pub fn persist(&self, snapshot: &AggregateSnapshot) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let last_written = Arc::clone(&self.last_written);
        let seq = self.next_write.fetch_add(1, Ordering::SeqCst) + 1;
        let total = snapshot.positive_marks_total;

        tokio::spawn(async move {
            let path = StorePath::PositiveCount.as_ref();
            let mut last = last_written.lock().await;
            if *last > seq {
                log::debug!("Skipping stale positive marks write #{seq}, #{} already landed", *last);
                return;
            }
            *last = seq;

            let value = match serde_json::to_value(PositiveCount { total }) {
                Ok(value) => value,
                Err(e) => {
                    log::error!("Failed to encode positive marks total: {e}");
                    return;
                }
            };
            match store.upsert(path, value).await {
                Ok(()) => log::debug!("Positive marks total {total} saved to {path}"),
                Err(e) => log::error!("Error saving positive marks total to {path}: {e}"),
            }
        })
    }

    /// Runs one full cycle: recompute, replace, persist.
    ///
    /// Returns the persistence handle, or `None` if the payload was
    /// rejected.
    pub fn run_cycle(&self, payload: &Value) -> Option<JoinHandle<()>> {
        self.process(payload).map(|snapshot| self.persist(&snapshot))
    }
}
