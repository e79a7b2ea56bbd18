// Path: crates/vault/src/lib.rs
//! # ForgeNumerics Vault Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
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
//! # ForgeNumerics Vault
//!
//! Durable memory for agents: a content-addressed object store, typed
//! metadata records with soft deletion, lexical and hybrid retrieval, a
//! hash-chained audit log, and signed FACT frame import and export.

pub mod audit;
pub mod index;
mod io;
pub mod record;
pub mod retriever;
pub mod store;
pub mod vault;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use index::MetadataIndex;
pub use record::{Fact, Provenance, Record, RecordBody, RecordKind, RecordView};
pub use retriever::{Embedder, HashingEmbedder, Retriever, SearchHit};
pub use store::{ContentStore, IntegrityReport, PutResult, StoreStats};
pub use vault::{ImportReport, SearchResult, Vault, VaultIntegrityReport, VaultStats};
