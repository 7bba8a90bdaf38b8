use building_watch_score_models::{DownloadEvent, StorePath};
use building_watch_store::{DocumentStore, StoreError};
use chrono::NaiveDateTime;

use crate::timestamp::format_timestamp;

/// Recorded in place of a missing user email.
pub const UNKNOWN_USER: &str = "Unknown user";

/// Appends one mission-order download to the `downloads` collection.
///
/// Returns the store-assigned id of the new event.
///
/// # Errors
///
/// Returns [`StoreError`] if the event cannot be written. The failure is
/// also logged.
pub async fn record_download(
    store: &dyn DocumentStore,
    email: Option<&str>,
    at: NaiveDateTime,
    latitude: f64,
    longitude: f64,
) -> Result<String, StoreError> {
    let collection = StorePath::Downloads.as_ref();
    let event = DownloadEvent {
        id: String::new(),
        email: email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(UNKNOWN_USER)
            .to_string(),
        timestamp: format_timestamp(at),
        latitude,
        longitude,
    };

    let result = match serde_json::to_value(&event) {
        Ok(value) => store.append(collection, value).await,
        Err(e) => Err(e.into()),
    };

    match &result {
        Ok(id) => log::info!("Recorded download {id} by {} at {}", event.email, event.timestamp),
        Err(e) => log::error!("Error saving download to {collection}: {e}"),
    }

    result
}
