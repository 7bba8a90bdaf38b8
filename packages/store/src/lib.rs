#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Document store and live record stream interfaces.
//!
//! Every pipeline component receives its store handle at construction
//! through [`DocumentStore`] and its live feed through [`RecordStream`].
//! Two backends are provided: [`memory`] for embedding and tests, and
//! [`file`] which keeps everything in a single JSON file on disk.
//! [`timeout::TimeoutStore`] bounds every call of any backend.

pub mod file;
pub mod memory;
pub mod timeout;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffered payloads per subscription before the producer waits.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The operation did not finish within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which store call timed out.
        operation: &'static str,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Store error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Collection and path oriented document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists every document of a collection, ordered by id.
    ///
    /// A missing collection is empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Reads the value stored at `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces whatever is stored at `path` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Adds a document to a collection, returning its new id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn append(&self, collection: &str, value: Value) -> Result<String, StoreError>;
}

/// A push-based source of full-state snapshots per topic.
#[async_trait]
pub trait RecordStream: Send + Sync {
    /// Starts listening on `topic`. The current value, if any, is delivered
    /// first, followed by every later change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the subscription cannot be established.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError>;
}

/// A live subscription handle.
///
/// Dropping the handle (or calling [`Subscription::cancel`]) detaches from
/// the source and stops any background poller feeding it.
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Value>,
    feeder: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a receiver. `feeder` is aborted when the subscription ends.
    #[must_use]
    pub fn new(topic: &str, rx: mpsc::Receiver<Value>, feeder: Option<JoinHandle<()>>) -> Self {
        Self {
            topic: topic.to_string(),
            rx,
            feeder,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next snapshot. `None` once the source has closed.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Detaches from the source.
    pub fn cancel(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        self.rx.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Human-readable kind of a JSON value, for error messages.
#[must_use]
pub const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
