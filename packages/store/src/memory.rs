//! In-process backends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::{Document, DocumentStore, RecordStream, SUBSCRIPTION_BUFFER, StoreError, Subscription};

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    paths: BTreeMap<String, Value>,
    next_id: u64,
}

/// A [`DocumentStore`] held entirely in memory.
///
/// Appended ids are zero-padded sequence numbers, so listing order is
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts documents under explicit ids, replacing existing ones.
    pub async fn seed(&self, collection: &str, docs: impl IntoIterator<Item = (String, Value)>) {
        let mut state = self.state.write().await;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.state.read().await.paths.get(path).cloned())
    }

    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .paths
            .insert(path.to_string(), value);
        Ok(())
    }

    async fn append(&self, collection: &str, value: Value) -> Result<String, StoreError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = format!("{:08}", state.next_id);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), value);
        Ok(id)
    }
}

#[derive(Debug, Default)]
struct Topic {
    current: Option<Value>,
    subscribers: Vec<mpsc::Sender<Value>>,
}

/// A [`RecordStream`] fed by explicit [`MemoryStream::publish`] calls.
///
/// Each publish replaces the topic's current value and pushes it to every
/// live subscriber. New subscribers receive the current value first.
#[derive(Debug, Default)]
pub struct MemoryStream {
    topics: Mutex<BTreeMap<String, Topic>>,
}

impl MemoryStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a full snapshot on `topic`.
    ///
    /// Returns the number of subscribers that received it. Subscribers
    /// that have gone away are pruned.
    pub async fn publish(&self, topic: &str, value: Value) -> usize {
        let subscribers = {
            let mut topics = self.topics.lock().await;
            let entry = topics.entry(topic.to_string()).or_default();
            entry.current = Some(value.clone());
            entry.subscribers.retain(|tx| !tx.is_closed());
            entry.subscribers.clone()
        };

        let mut delivered = 0;
        for tx in subscribers {
            if tx.send(value.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of subscribers still attached to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().await.get(topic).map_or(0, |t| {
            t.subscribers.iter().filter(|tx| !tx.is_closed()).count()
        })
    }
}

#[async_trait]
impl RecordStream for MemoryStream {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut topics = self.topics.lock().await;
        let entry = topics.entry(topic.to_string()).or_default();
        if let Some(current) = &entry.current {
            // Fresh channel, so this cannot be full.
            let _ = tx.try_send(current.clone());
        }
        entry.subscribers.push(tx);
        drop(topics);
        Ok(Subscription::new(topic, rx, None))
    }
}
