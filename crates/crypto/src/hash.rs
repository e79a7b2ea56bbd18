// Path: crates/crypto/src/hash.rs
//! SHA-256 digests and hash-chain primitives.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A SHA-256 digest, printed and serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The all-zero digest, used as the predecessor of the first chain entry.
    pub const GENESIS: Digest = Digest([0u8; DIGEST_LEN]);

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses exactly 64 lowercase hex characters.
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != DIGEST_LEN * 2 || text.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::GENESIS
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| format!("not a 64-character lowercase hex digest: {s:?}"))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Hashes bytes.
pub fn sha256(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Hashes `prev || content`, linking an entry to its predecessor.
pub fn hash_linked(content: &[u8], prev: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(prev.0);
    hasher.update(content);
    Digest(hasher.finalize().into())
}

/// Incremental hashing for content that arrives in pieces.
#[derive(Clone, Default)]
pub struct StreamHasher(Sha256);

impl StreamHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finish(self) -> Digest {
        Digest(self.0.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_round_trip_is_strict() {
        let digest = sha256(b"megafauna");
        assert_eq!(Digest::from_hex(&digest.to_hex()), Some(digest));
        assert!(Digest::from_hex(&digest.to_hex().to_uppercase()).is_none());
        assert!(Digest::from_hex("abcd").is_none());
        assert!(Digest::from_hex(&"g".repeat(64)).is_none());
    }

    #[test]
    fn linked_hash_depends_on_predecessor() {
        let a = hash_linked(b"entry", &Digest::GENESIS);
        let b = hash_linked(b"entry", &sha256(b"other"));
        assert_ne!(a, b);
        assert_eq!(a, hash_linked(b"entry", &Digest::GENESIS));
    }

    #[test]
    fn stream_hasher_matches_one_shot() {
        let mut hasher = StreamHasher::new();
        hasher.update(b"mega");
        hasher.update(b"fauna");
        assert_eq!(hasher.finish(), sha256(b"megafauna"));
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest = sha256(b"x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(Digest::GENESIS.is_genesis());
    }
}
