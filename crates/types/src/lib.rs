// Path: crates/types/src/lib.rs
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

//! # ForgeNumerics Types
//!
//! Error taxonomy and configuration structures shared by every ForgeNumerics
//! crate. This crate has minimal dependencies so it can sit at the bottom of
//! the dependency graph.

/// Configuration structs passed explicitly into component constructors.
pub mod config;
/// Typed errors for every concern, each with a stable [`error::ErrorCode`].
pub mod error;

pub use error::ErrorCode;
