#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the building watch pipeline.
//!
//! Every command works against a JSON store file (`--store` or
//! `BUILDING_WATCH_STORE`) whose calls are bounded by
//! `--io-timeout-secs`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use building_watch_aggregate::{Aggregator, decode_snapshot, positive_markers};
use building_watch_downloads::{EventQueryService, parse_filter_date, record_download};
use building_watch_geofence::engine::RayCasting;
use building_watch_geofence::registry::{Zone, default_zone, load_zone_file};
use building_watch_geofence::ZoneError;
use building_watch_ingest::IngestionListener;
use building_watch_reconcile::{DailyReconciler, OFFSET};
use building_watch_score_models::StorePath;
use building_watch_store::DocumentStore;
use building_watch_store::file::{FileSnapshotStream, JsonFileStore};
use building_watch_store::timeout::TimeoutStore;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "building_watch", about = "Building score monitoring pipeline")]
struct Cli {
    /// JSON file backing the document store
    #[arg(
        long,
        global = true,
        env = "BUILDING_WATCH_STORE",
        default_value = "building_watch.json"
    )]
    store: PathBuf,
    /// Monitoring zone TOML file. Defaults to the built-in zone.
    #[arg(long, global = true)]
    zone: Option<PathBuf>,
    /// Seconds before a store call is abandoned
    #[arg(
        long,
        global = true,
        env = "BUILDING_WATCH_IO_TIMEOUT_SECS",
        default_value_t = 30
    )]
    io_timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one aggregation cycle over a snapshot file and persist the
    /// positive count
    Aggregate {
        /// JSON file holding the `building_scores` records
        #[arg(long)]
        snapshot: PathBuf,
        /// Also print the positive in-zone records as map markers
        #[arg(long)]
        markers: bool,
    },
    /// Re-aggregate every time a snapshot file changes, until Ctrl-C
    Watch {
        /// JSON file holding the `building_scores` records
        #[arg(long)]
        snapshot: PathBuf,
        /// How often the file is checked for changes
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
    /// Print the offset-adjusted daily positive counts
    Reconcile {
        /// Baseline subtracted from every daily document
        #[arg(long, default_value_t = OFFSET, allow_negative_numbers = true)]
        offset: i64,
    },
    /// List recorded mission-order downloads, newest first
    Downloads {
        /// Only show downloads on this date (M/D/YYYY or YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Number of pages to reveal
        #[arg(long, default_value = "1")]
        pages: usize,
    },
    /// Record a mission-order download at the current local time
    RecordDownload {
        /// Email of the downloading user. Recorded as "Unknown user" if absent.
        #[arg(long)]
        email: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Print the active monitoring zone
    Zone,
}

fn load_zone(path: Option<&Path>) -> Result<Zone, ZoneError> {
    path.map_or_else(default_zone, load_zone_file)
}

fn open_store(path: &Path, timeout_secs: u64) -> Arc<dyn DocumentStore> {
    log::debug!("Using store file {}", path.display());
    Arc::new(TimeoutStore::new(
        JsonFileStore::new(path),
        Duration::from_secs(timeout_secs),
    ))
}

/// Reads a snapshot file, unwrapping the `building_scores` member if the
/// file holds a whole store export.
async fn read_snapshot(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok(match value {
        Value::Object(mut map) if map.contains_key(StorePath::BuildingScores.as_ref()) => map
            .remove(StorePath::BuildingScores.as_ref())
            .unwrap_or(Value::Null),
        other => other,
    })
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    building_watch_cli_utils::init_logger();
    let cli = Cli::parse();

    let store = open_store(&cli.store, cli.io_timeout_secs);

    match cli.command {
        Commands::Aggregate { snapshot, markers } => {
            let zone = load_zone(cli.zone.as_deref())?;
            let payload = read_snapshot(&snapshot).await?;
            let records = decode_snapshot(&payload)?;

            let aggregator = Aggregator::new(store, zone.polygon);
            if let Some(write) = aggregator.run_cycle(&payload) {
                write.await?;
            }
            println!("{}", serde_json::to_string_pretty(&aggregator.snapshot())?);

            if markers {
                let markers = positive_markers(&records, aggregator.polygon(), &RayCasting);
                println!("{}", serde_json::to_string_pretty(&markers)?);
            }
        }
        Commands::Watch {
            snapshot,
            interval_ms,
        } => {
            let zone = load_zone(cli.zone.as_deref())?;
            let aggregator = Arc::new(Aggregator::new(store, zone.polygon));
            let stream = Arc::new(FileSnapshotStream::new(
                snapshot,
                Duration::from_millis(interval_ms),
            ));

            let mut listener = IngestionListener::new(stream, Arc::clone(&aggregator));
            let mut updates = aggregator.watch();
            listener.start().await?;
            log::info!("Watching zone '{}', press Ctrl-C to stop", zone.name);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = updates.borrow_and_update().clone();
                        println!("{}", serde_json::to_string(&current)?);
                    }
                }
            }

            listener.stop()?;
        }
        Commands::Reconcile { offset } => {
            let series = DailyReconciler::new(store)
                .with_offset(offset)
                .run()
                .await?;
            println!("{:<12} COUNT", "DATE");
            println!("{}", "-".repeat(24));
            for point in &series.points {
                println!("{:<12} {}", point.date, point.count);
            }
        }
        Commands::Downloads { date, pages } => {
            let service = EventQueryService::new(store);
            service.load().await?;
            if let Some(date) = date {
                service.set_date_filter(parse_filter_date(&date)?);
            }
            for _ in 1..pages {
                if !service.load_more() {
                    break;
                }
            }

            let view = service.view();
            println!(
                "{:<12} {:<10} {:<32} {:>11} {:>11}",
                "DATE", "TIME", "EMAIL", "LATITUDE", "LONGITUDE"
            );
            println!("{}", "-".repeat(80));
            for row in &view.visible_window {
                println!(
                    "{:<12} {:<10} {:<32} {:>11.6} {:>11.6}",
                    row.display_date,
                    row.display_time,
                    row.event.email,
                    row.event.latitude,
                    row.event.longitude
                );
            }
            println!(
                "Showing {} of {} ({}){}",
                view.visible_window.len(),
                view.total,
                service.filter(),
                if view.has_more { ", more available" } else { "" }
            );
        }
        Commands::RecordDownload { email, lat, lng } => {
            let now = chrono::Local::now().naive_local();
            let id = record_download(store.as_ref(), email.as_deref(), now, lat, lng).await?;
            println!("Recorded download {id}");
        }
        Commands::Zone => {
            let zone = load_zone(cli.zone.as_deref())?;
            println!("{} ({})", zone.name, zone.id);
            if let Some(center) = zone.center {
                println!("Centre: {:.6}, {:.6}", center.lat, center.lng);
            }
            println!("{:<4} {:>11} {:>11}", "#", "LATITUDE", "LONGITUDE");
            for (i, vertex) in zone.polygon.vertices().iter().enumerate() {
                println!("{:<4} {:>11.6} {:>11.6}", i + 1, vertex.lat, vertex.lng);
            }
        }
    }

    Ok(())
}
