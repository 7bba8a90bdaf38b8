//! Backends persisted to local JSON files.
//!
//! [`JsonFileStore`] keeps every collection and path in one file:
//!
//! ```json
//! { "collections": { "downloads": { "00000001": { ... } } },
//!   "paths": { "count_marks_positive_score_diff": { "total": 3 } } }
//! ```
//!
//! [`FileSnapshotStream`] turns a JSON file that some other process keeps
//! rewriting into a live snapshot feed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};

use crate::{
    Document, DocumentStore, RecordStream, SUBSCRIPTION_BUFFER, StoreError, Subscription, json_kind,
};

const COLLECTIONS_KEY: &str = "collections";
const PATHS_KEY: &str = "paths";

/// A [`DocumentStore`] backed by a single JSON file.
///
/// Writes are serialized and land atomically through a sibling temp file.
/// A missing file reads as an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(&bytes)? {
            Value::Object(root) => Ok(root),
            other => Err(StoreError::Backend {
                message: format!(
                    "{} must hold a JSON object, found {}",
                    self.path.display(),
                    json_kind(&other)
                ),
            }),
        }
    }

    async fn save(&self, root: &Map<String, Value>) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_vec_pretty(root)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn section<'a>(
        root: &'a mut Map<String, Value>,
        key: &str,
    ) -> Result<&'a mut Map<String, Value>, StoreError> {
        let entry = root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            log::warn!("Replacing non-object store section '{key}'");
            *entry = Value::Object(Map::new());
        }
        entry.as_object_mut().ok_or_else(|| StoreError::Backend {
            message: format!("store section '{key}' is not an object"),
        })
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let root = self.load().await?;
        let Some(docs) = root
            .get(COLLECTIONS_KEY)
            .and_then(|c| c.get(collection))
            .and_then(Value::as_object)
        else {
            return Ok(Vec::new());
        };

        let sorted: BTreeMap<&String, &Value> = docs.iter().collect();
        Ok(sorted
            .into_iter()
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let root = self.load().await?;
        Ok(root.get(PATHS_KEY).and_then(|p| p.get(path)).cloned())
    }

    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.load().await?;
        Self::section(&mut root, PATHS_KEY)?.insert(path.to_string(), value);
        self.save(&root).await
    }

    async fn append(&self, collection: &str, value: Value) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.load().await?;
        let collections = Self::section(&mut root, COLLECTIONS_KEY)?;
        let docs = Self::section(collections, collection)?;

        let next = docs
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("{next:08}");
        docs.insert(id.clone(), value);

        self.save(&root).await?;
        Ok(id)
    }
}

/// A [`RecordStream`] that polls a JSON file and emits its content every
/// time the bytes change.
///
/// If the file holds an object with a key equal to the subscribed topic,
/// only that member is emitted; otherwise the whole document is. Files
/// that are missing or fail to parse are skipped until the next change.
#[derive(Debug, Clone)]
pub struct FileSnapshotStream {
    path: PathBuf,
    interval: Duration,
}

impl FileSnapshotStream {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    fn extract(topic: &str, value: Value) -> Value {
        match value {
            Value::Object(mut map) if map.contains_key(topic) => {
                map.remove(topic).unwrap_or(Value::Null)
            }
            other => other,
        }
    }
}

#[async_trait]
impl RecordStream for FileSnapshotStream {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let path = self.path.clone();
        let interval = self.interval;
        let topic_name = topic.to_string();

        let feeder = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<Vec<u8>> = None;

            loop {
                ticker.tick().await;
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::debug!("Snapshot file {} unreadable: {e}", path.display());
                        continue;
                    }
                };
                if last.as_deref() == Some(bytes.as_slice()) {
                    continue;
                }

                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => {
                        last = Some(bytes);
                        if tx.send(Self::extract(&topic_name, value)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Snapshot file {} is not valid JSON: {e}", path.display());
                        last = Some(bytes);
                    }
                }
            }
        });

        Ok(Subscription::new(topic, rx, Some(feeder)))
    }
}
