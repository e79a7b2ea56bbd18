// Path: crates/crypto/src/lib.rs
//! # ForgeNumerics Crypto Crate Lints
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
        clippy::indexing_slicing
    )
)]
//! # ForgeNumerics Cryptography
//!
//! SHA-256 content digests, HMAC-SHA256 frame signatures over canonical
//! text, the signer keyring, and hash chains of signed frames.

pub mod hash;
pub mod keyring;
pub mod signature;
pub mod verifier;

pub use hash::{sha256, Digest};
pub use keyring::{Keyring, SecretKey};
pub use signature::{Signature, SignedFrame};
pub use verifier::{
    link, FrameVerifier, VerificationResult, VerificationStatus, PREV_ENTRY_HASH,
};
