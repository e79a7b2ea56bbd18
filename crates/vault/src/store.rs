// Path: crates/vault/src/store.rs
//! Content-addressed object storage.
//!
//! Objects live at `objects/<prefix>/<rest>` where the directory name is the
//! first `bucket_prefix` hex characters of the SHA-256 digest. Writes go to
//! `objects/tmp/` first and are renamed into place, so a reader never sees a
//! partial object and concurrent writers of the same bytes converge on the
//! same file.
//!
//! Integrity scans never fail on a bad object: mismatches are collected into
//! an [`IntegrityReport`] so the caller can quarantine them and carry on.

use crate::io::{retry_once, write_atomic};
use forge_crypto::hash::{sha256, Digest};
use forge_types::error::{IntegrityError, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";
const QUARANTINE_DIR: &str = "quarantine";

/// Outcome of a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    pub digest: Digest,
    pub size: u64,
    /// False when identical bytes were already stored and nothing was written.
    pub is_new: bool,
}

/// Object count and total size on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub objects: u64,
    pub bytes: u64,
}

/// Result of re-hashing every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityReport {
    pub ok_count: u64,
    pub failed: Vec<IntegrityError>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Hex digests of the failed objects, in scan order.
    pub fn failed_digests(&self) -> Vec<String> {
        self.failed.iter().map(|e| e.digest().to_string()).collect()
    }
}

/// A directory of immutable objects addressed by their SHA-256 digest.
#[derive(Debug, Clone)]
pub struct ContentStore {
    objects: PathBuf,
    quarantine: PathBuf,
    bucket_prefix: usize,
}

impl ContentStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path, bucket_prefix: usize) -> Result<Self, StoreError> {
        let objects = root.join(OBJECTS_DIR);
        let quarantine = root.join(QUARANTINE_DIR);
        retry_once(|| fs::create_dir_all(objects.join(TMP_DIR)))?;
        retry_once(|| fs::create_dir_all(&quarantine))?;
        Ok(Self {
            objects,
            quarantine,
            bucket_prefix,
        })
    }

    /// Where the object for `digest` lives (whether or not it exists).
    pub fn object_path(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        let (bucket, rest) = (
            hex.get(..self.bucket_prefix).unwrap_or_default(),
            hex.get(self.bucket_prefix..).unwrap_or_default(),
        );
        self.objects.join(bucket).join(rest)
    }

    /// Stores bytes under their digest. Storing the same bytes again is a
    /// no-op that reports `is_new: false`.
    pub fn put(&self, bytes: &[u8]) -> Result<PutResult, StoreError> {
        let digest = sha256(bytes);
        let size = bytes.len() as u64;
        let path = self.object_path(&digest);
        if path.exists() {
            tracing::debug!(target: "store", "object {digest} already present");
            return Ok(PutResult {
                digest,
                size,
                is_new: false,
            });
        }
        if let Some(bucket) = path.parent() {
            retry_once(|| fs::create_dir_all(bucket))?;
        }
        let tmp = self
            .objects
            .join(TMP_DIR)
            .join(format!("{}.{}", digest.to_hex(), uuid::Uuid::new_v4().simple()));
        write_atomic(&tmp, &path, bytes)?;
        tracing::debug!(target: "store", "stored object {digest} ({size} bytes)");
        Ok(PutResult {
            digest,
            size,
            is_new: true,
        })
    }

    /// Reads an object back, re-checking its digest.
    pub fn get(&self, digest: &Digest) -> Result<Vec<u8>, StoreError> {
        let bytes = match retry_once(|| fs::read(self.object_path(digest))) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(digest.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        let actual = sha256(&bytes);
        if actual != *digest {
            tracing::warn!(target: "store", "object {digest} hashes to {actual}");
            return Err(IntegrityError::DigestMismatch {
                digest: digest.to_hex(),
                actual: actual.to_hex(),
            }
            .into());
        }
        Ok(bytes)
    }

    /// Like [`ContentStore::get`] but addressed by a hex string.
    pub fn get_hex(&self, hex: &str) -> Result<Vec<u8>, StoreError> {
        let digest = Digest::from_hex(hex).ok_or_else(|| StoreError::InvalidDigest(hex.to_string()))?;
        self.get(&digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.object_path(digest).is_file()
    }

    /// Every stored digest with its path, sorted by digest.
    pub fn digests(&self) -> Result<Vec<Digest>, StoreError> {
        Ok(self.scan()?.into_iter().map(|(d, _)| d).collect())
    }

    fn scan(&self) -> Result<Vec<(Digest, PathBuf)>, StoreError> {
        let mut found = Vec::new();
        for bucket in retry_once(|| fs::read_dir(&self.objects))? {
            let bucket = bucket?;
            let bucket_name = bucket.file_name().to_string_lossy().into_owned();
            if bucket_name == TMP_DIR || !bucket.file_type()?.is_dir() {
                continue;
            }
            for object in fs::read_dir(bucket.path())? {
                let object = object?;
                let name = object.file_name().to_string_lossy().into_owned();
                match Digest::from_hex(&format!("{bucket_name}{name}")) {
                    Some(digest) => found.push((digest, object.path())),
                    None => {
                        tracing::warn!(target: "store", "ignoring stray file {}", object.path().display())
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for (_, path) in self.scan()? {
            stats.objects += 1;
            stats.bytes += fs::metadata(&path)?.len();
        }
        Ok(stats)
    }

    /// Re-hashes every object. Unreadable and mismatching objects are
    /// reported, never raised.
    pub fn verify_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let mut report = IntegrityReport::default();
        for (digest, path) in self.scan()? {
            match retry_once(|| fs::read(&path)) {
                Ok(bytes) => {
                    let actual = sha256(&bytes);
                    if actual == digest {
                        report.ok_count += 1;
                    } else {
                        report.failed.push(IntegrityError::DigestMismatch {
                            digest: digest.to_hex(),
                            actual: actual.to_hex(),
                        });
                    }
                }
                Err(e) => report.failed.push(IntegrityError::Unreadable {
                    digest: digest.to_hex(),
                    reason: e.to_string(),
                }),
            }
        }
        if !report.is_clean() {
            tracing::warn!(
                target: "store",
                "integrity scan: {} ok, {} failed",
                report.ok_count,
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Moves an object into `quarantine/`, returning its new path. A later
    /// `put` of the correct bytes restores the object.
    pub fn quarantine(&self, digest: &Digest) -> Result<PathBuf, StoreError> {
        let from = self.object_path(digest);
        if !from.is_file() {
            return Err(StoreError::NotFound(digest.to_hex()));
        }
        let to = self.quarantine.join(digest.to_hex());
        retry_once(|| fs::rename(&from, &to))?;
        tracing::warn!(target: "store", "quarantined object {digest}");
        Ok(to)
    }
}
