//! Paginated, date-filterable view over the download log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use building_watch_score_models::{DownloadEvent, StorePath};
use building_watch_store::{DocumentStore, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum_macros::Display;

use crate::PAGE_SIZE;
use crate::timestamp::{display_parts, parse_timestamp};

/// Which events the view pages through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum DateFilter {
    /// The full log.
    #[default]
    #[strum(serialize = "unfiltered")]
    Unfiltered,
    /// Events whose timestamp falls on this calendar date.
    #[strum(serialize = "filtered")]
    Filtered(NaiveDate),
}

impl DateFilter {
    #[must_use]
    pub const fn date(self) -> Option<NaiveDate> {
        match self {
            Self::Unfiltered => None,
            Self::Filtered(date) => Some(date),
        }
    }
}

/// One event of the log together with its display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    #[serde(flatten)]
    pub event: DownloadEvent,
    /// `MM/DD/YYYY`, or `Invalid date`.
    pub display_date: String,
    /// `HH:MM:SS`, or `Invalid time`.
    pub display_time: String,
    #[serde(skip)]
    pub parsed: Option<NaiveDateTime>,
}

impl EventRow {
    fn new(event: DownloadEvent) -> Self {
        let parsed = match parse_timestamp(&event.timestamp) {
            Ok(at) => Some(at),
            Err(e) => {
                log::warn!("Download {} has an unusable timestamp: {e}", event.id);
                None
            }
        };
        let (display_date, display_time) = display_parts(parsed);
        Self {
            event,
            display_date,
            display_time,
            parsed,
        }
    }
}

/// A point-in-time copy of what the query service shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryView {
    /// Prefix of the active source set, newest first.
    pub visible_window: Vec<EventRow>,
    pub page_cursor: usize,
    pub active_date_filter: Option<NaiveDate>,
    /// Whether [`EventQueryService::load_more`] would reveal more events.
    pub has_more: bool,
    /// Size of the active source set.
    pub total: usize,
}

#[derive(Debug, Default)]
struct State {
    /// Every event, sorted newest first; unparsable timestamps last.
    log: Vec<EventRow>,
    /// Indices into `log` of the active source set, in log order.
    source: Vec<usize>,
    filter: DateFilter,
    page_cursor: usize,
    loading: bool,
}

impl State {
    fn visible_len(&self) -> usize {
        self.page_cursor
            .saturating_mul(PAGE_SIZE)
            .min(self.source.len())
    }

    fn select(&mut self, filter: DateFilter) {
        self.source = match filter {
            DateFilter::Unfiltered => (0..self.log.len()).collect(),
            DateFilter::Filtered(date) => self
                .log
                .iter()
                .enumerate()
                .filter(|(_, row)| row.parsed.is_some_and(|at| at.date() == date))
                .map(|(i, _)| i)
                .collect(),
        };
        self.filter = filter;
        self.page_cursor = 1;
    }
}

/// Clears the loading flag even if the load future is dropped mid-fetch.
struct LoadingGuard<'a> {
    state: &'a Mutex<State>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading = false;
    }
}

/// Holds the download log and the paginated view over it.
///
/// The log is fetched once by [`load`](Self::load). Later writes to the
/// store are not reflected until the next load; filter, reset and
/// load-more only move over the already fetched log.
///
/// Filtering by date also supports [`load_more`](Self::load_more) over
/// the filtered subset.
pub struct EventQueryService {
    store: Arc<dyn DocumentStore>,
    state: Mutex<State>,
}

impl EventQueryService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the full log and shows its first page, unfiltered.
    ///
    /// Documents that are not download events are skipped with a warning.
    /// A call made while another load is in flight does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the collection cannot be read; the
    /// previous view is kept in that case.
    pub async fn load(&self) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            if state.loading {
                log::debug!("Download log load already in flight");
                return Ok(());
            }
            state.loading = true;
        }
        let _guard = LoadingGuard { state: &self.state };

        let collection = StorePath::Downloads.as_ref();
        let docs = self.store.list(collection).await?;

        let mut rows: Vec<EventRow> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<DownloadEvent>(doc.data) {
                Ok(mut event) => {
                    event.id = doc.id;
                    Some(EventRow::new(event))
                }
                Err(e) => {
                    log::warn!("Skipping malformed {collection} document {}: {e}", doc.id);
                    None
                }
            })
            .collect();
        rows.sort_by(|a, b| b.parsed.cmp(&a.parsed));

        let mut state = self.state();
        state.log = rows;
        state.select(DateFilter::Unfiltered);
        log::info!("Loaded {} download events", state.log.len());

        Ok(())
    }

    /// Reveals the next page of the active source set.
    ///
    /// Returns `false` (and changes nothing) while a load is in flight or
    /// when every event is already visible.
    pub fn load_more(&self) -> bool {
        let mut state = self.state();
        if state.loading || state.visible_len() >= state.source.len() {
            return false;
        }
        state.page_cursor += 1;
        true
    }

    /// Restricts the view to events on `date` and shows its first page.
    ///
    /// Events whose timestamp does not parse never match.
    pub fn set_date_filter(&self, date: NaiveDate) {
        let mut state = self.state();
        state.select(DateFilter::Filtered(date));
        log::debug!("{} download events on {date}", state.source.len());
    }

    /// Drops the date filter and shows the first page of the full log.
    pub fn reset(&self) {
        self.state().select(DateFilter::Unfiltered);
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    #[must_use]
    pub fn filter(&self) -> DateFilter {
        self.state().filter
    }

    #[must_use]
    pub fn view(&self) -> QueryView {
        let state = self.state();
        let visible = state.visible_len();
        QueryView {
            visible_window: state.source[..visible]
                .iter()
                .map(|&i| state.log[i].clone())
                .collect(),
            page_cursor: state.page_cursor,
            active_date_filter: state.filter.date(),
            has_more: visible < state.source.len(),
            total: state.source.len(),
        }
    }
}
