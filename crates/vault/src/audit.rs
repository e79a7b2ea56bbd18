// Path: crates/vault/src/audit.rs
//! Append-only, hash-chained audit log.
//!
//! Each line is one [`AuditEntry`]. `entry_hash` is SHA-256 over
//! `prev_hash || body`, where `body` is the JSON of the entry without its
//! two hash fields; the first entry links to the all-zero digest.

use crate::io::{append_line, read_lines};
use forge_crypto::hash::{hash_linked, Digest};
use forge_types::error::VaultError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ImportText,
    PutFact,
    PutSummary,
    ImportFrame,
    Forget,
    Quarantine,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::ImportText => "import_text",
            AuditAction::PutFact => "put_fact",
            AuditAction::PutSummary => "put_summary",
            AuditAction::ImportFrame => "import_frame",
            AuditAction::Forget => "forget",
            AuditAction::Quarantine => "quarantine",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub action: AuditAction,
    pub record_id: Option<String>,
    pub detail: String,
    pub prev_hash: Digest,
    pub entry_hash: Digest,
}

#[derive(Serialize)]
struct HashedBody<'a> {
    seq: u64,
    timestamp: u64,
    action: AuditAction,
    record_id: Option<&'a str>,
    detail: &'a str,
}

impl AuditEntry {
    fn compute_hash(
        seq: u64,
        timestamp: u64,
        action: AuditAction,
        record_id: Option<&str>,
        detail: &str,
        prev_hash: &Digest,
    ) -> Result<Digest, VaultError> {
        let body = serde_json::to_vec(&HashedBody {
            seq,
            timestamp,
            action,
            record_id,
            detail,
        })
        .map_err(|e| VaultError::Serde(e.to_string()))?;
        Ok(hash_linked(&body, prev_hash))
    }

    /// Recomputes this entry's hash from its fields.
    pub fn expected_hash(&self) -> Result<Digest, VaultError> {
        Self::compute_hash(
            self.seq,
            self.timestamp,
            self.action,
            self.record_id.as_deref(),
            &self.detail,
            &self.prev_hash,
        )
    }
}

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    next_seq: u64,
    head: Digest,
}

impl AuditLog {
    /// Opens the log and positions after its last entry. The chain itself
    /// is only checked by [`AuditLog::verify`].
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        let entries = read_entries(path)?;
        let (next_seq, head) = entries
            .last()
            .map_or((0, Digest::GENESIS), |e| (e.seq + 1, e.entry_hash));
        Ok(Self {
            path: path.to_path_buf(),
            next_seq,
            head,
        })
    }

    /// Appends an entry linked to the current head.
    pub fn append(
        &mut self,
        action: AuditAction,
        record_id: Option<&str>,
        detail: &str,
    ) -> Result<AuditEntry, VaultError> {
        let timestamp = forge_crypto::verifier::now_ms();
        let entry_hash =
            AuditEntry::compute_hash(self.next_seq, timestamp, action, record_id, detail, &self.head)?;
        let entry = AuditEntry {
            seq: self.next_seq,
            timestamp,
            action,
            record_id: record_id.map(str::to_string),
            detail: detail.to_string(),
            prev_hash: self.head,
            entry_hash,
        };
        let line = serde_json::to_string(&entry).map_err(|e| VaultError::Serde(e.to_string()))?;
        append_line(&self.path, &line)?;
        tracing::info!(target: "audit", seq = entry.seq, action = %action, "audit entry appended");
        self.next_seq += 1;
        self.head = entry_hash;
        Ok(entry)
    }

    pub fn entries(&self) -> Result<Vec<AuditEntry>, VaultError> {
        read_entries(&self.path)
    }

    /// Number of entries written so far.
    pub fn len(&self) -> u64 {
        self.next_seq
    }

    pub fn is_empty(&self) -> bool {
        self.next_seq == 0
    }

    /// Walks the chain, returning the entry count or the first broken
    /// sequence number.
    pub fn verify(&self) -> Result<u64, VaultError> {
        let mut prev = Digest::GENESIS;
        let mut count = 0u64;
        for (expected_seq, entry) in (0u64..).zip(self.entries()?) {
            let broken = |reason: String| VaultError::AuditChain {
                seq: entry.seq,
                reason,
            };
            if entry.seq != expected_seq {
                return Err(broken(format!("expected seq {expected_seq}")));
            }
            if entry.prev_hash != prev {
                return Err(broken(format!("prev_hash does not match entry {}", expected_seq.saturating_sub(1))));
            }
            let recomputed = entry.expected_hash()?;
            if recomputed != entry.entry_hash {
                return Err(broken(format!("entry_hash should be {recomputed}")));
            }
            prev = entry.entry_hash;
            count += 1;
        }
        Ok(count)
    }
}

fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, VaultError> {
    let mut entries = Vec::new();
    for (n, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: AuditEntry = serde_json::from_str(line).map_err(|e| VaultError::AuditChain {
            seq: n as u64,
            reason: format!("line {} does not decode: {e}", n + 1),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn log_with(n: u64) -> (tempfile::TempDir, AuditLog) {
        let dir = tempfile::tempdir().unwrap();
        let mut log = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
        for i in 0..n {
            log.append(AuditAction::PutFact, Some(&format!("r{i}")), "fact stored")
                .unwrap();
        }
        (dir, log)
    }

    fn rewrite(log: &AuditLog, edit: impl FnOnce(&mut Vec<AuditEntry>)) {
        let mut entries = log.entries().unwrap();
        edit(&mut entries);
        let text: String = entries
            .iter()
            .map(|e| serde_json::to_string(e).unwrap() + "\n")
            .collect();
        fs::write(&log.path, text).unwrap();
    }

    #[test]
    fn chain_links_from_genesis() {
        let (_dir, log) = log_with(3);
        let entries = log.entries().unwrap();
        assert_eq!(entries[0].prev_hash, Digest::GENESIS);
        assert_eq!(entries[1].prev_hash, entries[0].entry_hash);
        assert_eq!(entries[2].seq, 2);
        assert_eq!(log.verify().unwrap(), 3);
    }

    #[test]
    fn reopen_continues_the_chain() {
        let (dir, log) = log_with(2);
        drop(log);
        let mut log = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(log.len(), 2);
        let entry = log.append(AuditAction::Forget, Some("r0"), "duplicate").unwrap();
        assert_eq!(entry.seq, 2);
        assert_eq!(log.verify().unwrap(), 3);
    }

    #[test]
    fn edited_detail_is_caught_at_its_seq() {
        let (_dir, log) = log_with(4);
        rewrite(&log, |entries| entries[2].detail = "rewritten".into());
        assert!(matches!(log.verify(), Err(VaultError::AuditChain { seq: 2, .. })));
    }

    #[test]
    fn removed_entry_is_caught() {
        let (_dir, log) = log_with(4);
        rewrite(&log, |entries| {
            entries.remove(1);
        });
        assert!(matches!(log.verify(), Err(VaultError::AuditChain { seq: 2, .. })));
    }

    #[test]
    fn rehashed_edit_still_breaks_the_next_link() {
        let (_dir, log) = log_with(3);
        rewrite(&log, |entries| {
            entries[0].detail = "forged".into();
            entries[0].entry_hash = entries[0].expected_hash().unwrap();
        });
        assert!(matches!(log.verify(), Err(VaultError::AuditChain { seq: 1, .. })));
    }
}
