#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the building watch toolchain.
//!
//! Any binary that calls [`init_logger()`] at startup gets `RUST_LOG`
//! driven, colourised output for every `log::info!` and friends emitted by
//! the pipeline crates.

/// Initializes the global `pretty_env_logger` logger from `RUST_LOG`.
///
/// Returns the maximum enabled level. Safe to call more than once; later
/// calls leave the first logger installed.
pub fn init_logger() -> log::LevelFilter {
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    log::set_boxed_logger(Box::new(logger)).ok(); // Already set (e.g., in tests)

    log::set_max_level(level);

    level
}
