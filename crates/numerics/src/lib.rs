// Path: crates/numerics/src/lib.rs
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

//! # ForgeNumerics Codec
//!
//! A canonical symbolic encoding for numbers and structured data, designed
//! so that the same content always produces the same text.
//!
//! ## Layers
//!
//! *   **Numeric profiles** ([`numeric`]): integers, exact decimals,
//!     simplified floats and byte blobs written as single base-3 tokens.
//!
//! *   **Frames** ([`frame`]): `⟦ KEY=value ∷ tokens ⟧` records with a
//!     strict single-pass parser and an idempotent canonical form. The
//!     canonical text is what gets hashed, signed and deduplicated.
//!
//! *   **Extension dictionary** ([`dictionary`]): a persisted allocator
//!     mapping out-of-vocabulary words to short glyph combinations.
//!
//! *   **Blob frames** ([`compression`]): byte strings packed into frames,
//!     optionally compressed with zlib, gzip or zstd.
//!
//! *   **Schemas** ([`schema`]): structural validation for the builtin
//!     frame kinds and for self-described custom schemas.

pub mod compression;
pub mod dictionary;
pub mod frame;
pub mod numeric;
pub mod schema;

pub use compression::{compress, decompress, Codec};
pub use dictionary::{Combo, ExtensionDictionary};
pub use frame::{canonical_text, parse, serialize, Frame, FrameBuilder, Token};
pub use numeric::{Decimal, NumericValue, Profile, SimpleFloat};
pub use schema::{FrameKind, SchemaRegistry};
