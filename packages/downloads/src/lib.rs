#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The mission-order download log.
//!
//! Downloads are appended by [`record_download`] and browsed through
//! [`EventQueryService`], which pages newest-first in steps of
//! [`PAGE_SIZE`] over the full log or over a single calendar day.

pub mod query;
pub mod record;
pub mod timestamp;

pub use query::{DateFilter, EventQueryService, EventRow, QueryView};
pub use record::{UNKNOWN_USER, record_download};
pub use timestamp::{format_timestamp, parse_filter_date, parse_timestamp};

/// Events revealed per page.
pub const PAGE_SIZE: usize = 10;
