// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # ForgeNumerics Telemetry
//!
//! Structured logging initialisation for processes embedding the codec and
//! vault. Library crates only emit `tracing` events (and `log` records, which
//! are bridged); installing a subscriber is left to the host process.

/// The initialization routine for global structured logging.
pub mod init;

pub use init::{init_tracing, init_tracing_with_filter};
