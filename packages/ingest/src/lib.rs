#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Live feed listener for building score snapshots.
//!
//! [`IngestionListener`] subscribes to the `building_scores` topic and
//! hands every full snapshot to the [`Aggregator`]. A single consumer task
//! owns the subscription, so recomputation cycles never overlap.

use std::sync::Arc;

use building_watch_aggregate::Aggregator;
use building_watch_score_models::StorePath;
use building_watch_store::{RecordStream, StoreError};
use tokio::task::JoinHandle;

/// Errors returned by the listener lifecycle methods.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// `start()` was called on a running listener.
    #[error("Listener is already running")]
    AlreadyRunning,

    /// `stop()` was called on a stopped listener.
    #[error("Listener is not running")]
    NotRunning,

    /// The subscription could not be established.
    #[error("Subscription failed: {0}")]
    Store(#[from] StoreError),
}

/// Explicit start/stop handle around a feed subscription.
pub struct IngestionListener {
    stream: Arc<dyn RecordStream>,
    aggregator: Arc<Aggregator>,
    topic: String,
    consumer: Option<JoinHandle<()>>,
}

impl IngestionListener {
    /// Creates a stopped listener on the `building_scores` topic.
    #[must_use]
    pub fn new(stream: Arc<dyn RecordStream>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            stream,
            aggregator,
            topic: StorePath::BuildingScores.to_string(),
            consumer: None,
        }
    }

    /// Listens on a different topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    #[must_use]
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Whether the consumer task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.consumer.as_ref().is_some_and(|c| !c.is_finished())
    }

    /// Subscribes and starts processing snapshots.
    ///
    /// Each emission replaces the aggregate wholesale and triggers a
    /// background write of the positive count.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::AlreadyRunning`] if already started, or
    /// [`IngestError::Store`] if the subscription cannot be established.
    pub async fn start(&mut self) -> Result<(), IngestError> {
        if self.is_running() {
            return Err(IngestError::AlreadyRunning);
        }

        let mut subscription = self.stream.subscribe(&self.topic).await?;
        let aggregator = Arc::clone(&self.aggregator);
        let topic = self.topic.clone();
        log::info!("Listening for snapshots on '{topic}'");

        self.consumer = Some(tokio::spawn(async move {
            let mut cycles: u64 = 0;
            while let Some(payload) = subscription.next().await {
                cycles += 1;
                log::debug!("Snapshot #{cycles} received on '{topic}'");
                // Persistence is fire-and-forget; the handle is dropped.
                drop(aggregator.run_cycle(&payload));
            }
            log::info!("Feed '{topic}' closed after {cycles} snapshots");
        }));

        Ok(())
    }

    /// Detaches from the feed.
    ///
    /// Writes already spawned by earlier cycles are left to complete.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NotRunning`] if the listener was never
    /// started or has already been stopped.
    pub fn stop(&mut self) -> Result<(), IngestError> {
        let consumer = self.consumer.take().ok_or(IngestError::NotRunning)?;
        consumer.abort();
        log::info!("Stopped listening on '{}'", self.topic);
        Ok(())
    }
}

impl Drop for IngestionListener {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
    }
}
