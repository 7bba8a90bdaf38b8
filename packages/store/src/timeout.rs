//! Bounded-time decorator for any [`DocumentStore`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, DocumentStore, StoreError};

/// Default bound applied to each store call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a store so every call fails with [`StoreError::Timeout`] instead
/// of hanging past `after`. Successful calls behave exactly as the inner
/// store's.
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    after: Duration,
}

impl<S: DocumentStore> TimeoutStore<S> {
    #[must_use]
    pub const fn new(inner: S, after: Duration) -> Self {
        Self { inner, after }
    }

    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.after, fut)
            .await
            .map_err(|_| StoreError::Timeout {
                operation,
                after: self.after,
            })?
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for TimeoutStore<S> {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.bounded("list", self.inner.list(collection)).await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.bounded("get", self.inner.get(path)).await
    }

    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.bounded("upsert", self.inner.upsert(path, value)).await
    }

    async fn append(&self, collection: &str, value: Value) -> Result<String, StoreError> {
        self.bounded("append", self.inner.append(collection, value))
            .await
    }
}
