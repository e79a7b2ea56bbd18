// Path: crates/vault/src/index.rs
//! The metadata index: every record, held in memory and mirrored to an
//! append-only JSON-lines file.
//!
//! Records are never rewritten. Forgetting appends a tombstone; queries
//! filter tombstoned records (and the chunks of tombstoned documents) out
//! while `view` still returns them for audit.

use crate::io::{append_lines, read_lines, truncate_to};
use crate::record::{Record, RecordBody, RecordKind, RecordView};
use forge_types::error::VaultError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Records on disk but not yet in memory.
#[derive(Debug)]
#[must_use = "staged records must be committed or rolled back"]
pub struct Staged {
    records: Vec<Record>,
    rollback_len: u64,
}

#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    records: Vec<Record>,
    by_id: HashMap<String, usize>,
    /// Target id -> position of its tombstone.
    tombstones: HashMap<String, usize>,
}

impl MetadataIndex {
    /// Loads the index at `path`; a missing file is an empty index.
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        let mut index = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
            by_id: HashMap::new(),
            tombstones: HashMap::new(),
        };
        for (n, line) in read_lines(path)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Record =
                serde_json::from_str(line).map_err(|e| VaultError::CorruptIndex {
                    line: n + 1,
                    reason: e.to_string(),
                })?;
            if index.by_id.contains_key(&record.id) {
                return Err(VaultError::CorruptIndex {
                    line: n + 1,
                    reason: format!("duplicate record id {}", record.id),
                });
            }
            index.insert(record);
        }
        tracing::debug!(target: "index", "loaded {} records from {}", index.records.len(), path.display());
        Ok(index)
    }

    fn insert(&mut self, record: Record) {
        let pos = self.records.len();
        if let RecordBody::Tombstone { target_id, .. } = &record.body {
            self.tombstones.entry(target_id.clone()).or_insert(pos);
        }
        self.by_id.insert(record.id.clone(), pos);
        self.records.push(record);
    }

    /// Persists a record, then makes it visible. Nothing changes in memory
    /// if the write fails.
    pub fn append(&mut self, record: Record) -> Result<(), VaultError> {
        let staged = self.stage(vec![record])?;
        self.commit(staged);
        Ok(())
    }

    /// Writes `records` to disk in one append without making them visible.
    /// Follow with [`MetadataIndex::commit`] or [`MetadataIndex::rollback`].
    pub fn stage(&self, records: Vec<Record>) -> Result<Staged, VaultError> {
        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(records.len());
        for record in &records {
            if self.by_id.contains_key(&record.id) || !seen.insert(record.id.as_str()) {
                return Err(VaultError::Rejected(format!("record id {} already in use", record.id)));
            }
            lines.push(serde_json::to_string(record).map_err(|e| VaultError::Serde(e.to_string()))?);
        }
        let rollback_len = append_lines(&self.path, &lines)?;
        Ok(Staged {
            records,
            rollback_len,
        })
    }

    /// Makes staged records visible.
    pub fn commit(&mut self, staged: Staged) {
        for record in staged.records {
            tracing::debug!(target: "index", "appended {:?} record {}", record.kind(), record.id);
            self.insert(record);
        }
    }

    /// Removes staged records from disk; they were never visible.
    pub fn rollback(&self, staged: Staged) -> Result<(), VaultError> {
        truncate_to(&self.path, staged.rollback_len)?;
        tracing::debug!(target: "index", "rolled back {} staged records", staged.records.len());
        Ok(())
    }

    /// Any record by id, tombstoned or not.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).and_then(|&pos| self.records.get(pos))
    }

    /// The tombstone attached to `id`, if it was forgotten.
    pub fn tombstone_of(&self, id: &str) -> Option<&Record> {
        self.tombstones.get(id).and_then(|&pos| self.records.get(pos))
    }

    /// The audit path: a record with its tombstone attached.
    pub fn view(&self, id: &str) -> Option<RecordView> {
        self.get(id).map(|record| RecordView {
            record: record.clone(),
            tombstone: self.tombstone_of(id).cloned(),
        })
    }

    /// False for tombstones, forgotten records and chunks of forgotten
    /// documents.
    pub fn is_live(&self, record: &Record) -> bool {
        match &record.body {
            RecordBody::Tombstone { .. } => false,
            RecordBody::Chunk { doc_id, .. } => {
                !self.tombstones.contains_key(&record.id) && !self.tombstones.contains_key(doc_id)
            }
            _ => !self.tombstones.contains_key(&record.id),
        }
    }

    /// Live records in insertion order.
    pub fn live(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| self.is_live(r))
    }

    fn live_of(&self, kind: RecordKind) -> Vec<&Record> {
        self.live().filter(|r| r.kind() == kind).collect()
    }

    pub fn list_docs(&self) -> Vec<&Record> {
        self.live_of(RecordKind::Doc)
    }

    pub fn list_facts(&self) -> Vec<&Record> {
        self.live_of(RecordKind::Fact)
    }

    pub fn list_summaries(&self) -> Vec<&Record> {
        self.live_of(RecordKind::Summary)
    }

    /// Live chunks of a document, in document order.
    pub fn chunks_of(&self, doc_id: &str) -> Vec<&Record> {
        let mut chunks: Vec<&Record> = self
            .live()
            .filter(|r| matches!(&r.body, RecordBody::Chunk { doc_id: d, .. } if d == doc_id))
            .collect();
        chunks.sort_by_key(|r| match &r.body {
            RecordBody::Chunk { ordinal, .. } => *ordinal,
            _ => 0,
        });
        chunks
    }

    /// Live records whose provenance names this conversation.
    pub fn by_conversation(&self, conversation_id: &str) -> Vec<&Record> {
        self.live()
            .filter(|r| r.provenance.conversation_id.as_deref() == Some(conversation_id))
            .collect()
    }

    /// Count of every record, tombstones included, by kind.
    pub fn counts(&self) -> HashMap<RecordKind, u64> {
        let mut counts = HashMap::new();
        for record in &self.records {
            *counts.entry(record.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fact, Provenance};
    use forge_crypto::hash::sha256;

    fn fact(subject: &str, conversation: Option<&str>) -> Record {
        let provenance = match conversation {
            Some(c) => Provenance::source("test").with_conversation(c),
            None => Provenance::source("test"),
        };
        Record::new(
            RecordBody::Fact {
                fact: Fact::new(subject, "is", "known"),
                digest: sha256(subject.as_bytes()),
            },
            provenance,
        )
    }

    fn tombstone(target: &str) -> Record {
        Record::new(
            RecordBody::Tombstone {
                target_id: target.into(),
                reason: "duplicate".into(),
            },
            Provenance::default(),
        )
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let mut index = MetadataIndex::open(&path).unwrap();
        let a = fact("a", Some("c1"));
        let b = fact("b", None);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        index.append(a).unwrap();
        index.append(b).unwrap();
        index.append(tombstone(&a_id)).unwrap();

        let reopened = MetadataIndex::open(&path).unwrap();
        assert_eq!(reopened.len(), 3);
        let facts: Vec<&str> = reopened.list_facts().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(facts, vec![b_id.as_str()]);
        let view = reopened.view(&a_id).unwrap();
        assert!(view.is_forgotten());
        assert_eq!(view.record.as_fact().unwrap().subject, "a");
    }

    #[test]
    fn staged_records_stay_hidden_until_committed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let mut index = MetadataIndex::open(&path).unwrap();
        let kept = fact("kept", None);
        let kept_id = kept.id.clone();
        index.append(kept).unwrap();

        let staged = index.stage(vec![fact("x", None), fact("y", None)]).unwrap();
        assert_eq!(index.len(), 1);
        index.rollback(staged).unwrap();
        let reopened = MetadataIndex::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get(&kept_id).is_some());

        let staged = index.stage(vec![fact("z", None)]).unwrap();
        index.commit(staged);
        assert_eq!(index.list_facts().len(), 2);
        assert_eq!(MetadataIndex::open(&path).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_ids_in_one_batch_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let index = MetadataIndex::open(&path).unwrap();
        let a = fact("a", None);
        let err = index.stage(vec![a.clone(), a]).unwrap_err();
        assert!(matches!(err, VaultError::Rejected(_)));
        assert!(MetadataIndex::open(&path).unwrap().is_empty());
    }

    #[test]
    fn chunks_follow_their_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("r.jsonl")).unwrap();
        let digest = sha256(b"doc");
        let doc = Record::new(
            RecordBody::Doc {
                digest,
                title: None,
                byte_len: 3,
            },
            Provenance::default(),
        );
        let doc_id = doc.id.clone();
        index.append(doc).unwrap();
        for ordinal in [1u32, 0] {
            index
                .append(Record::new(
                    RecordBody::Chunk {
                        doc_id: doc_id.clone(),
                        digest,
                        ordinal,
                        start: u64::from(ordinal),
                        end: u64::from(ordinal) + 1,
                    },
                    Provenance::default(),
                ))
                .unwrap();
        }
        let ordinals: Vec<u64> = index
            .chunks_of(&doc_id)
            .iter()
            .map(|r| match r.body {
                RecordBody::Chunk { start, .. } => start,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ordinals, vec![0, 1]);

        index.append(tombstone(&doc_id)).unwrap();
        assert!(index.chunks_of(&doc_id).is_empty());
        assert!(index.list_docs().is_empty());
        assert_eq!(index.counts().get(&RecordKind::Chunk), Some(&2));
    }

    #[test]
    fn conversation_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("r.jsonl")).unwrap();
        index.append(fact("a", Some("c1"))).unwrap();
        index.append(fact("b", Some("c2"))).unwrap();
        index.append(fact("c", Some("c1"))).unwrap();
        assert_eq!(index.by_conversation("c1").len(), 2);
        assert!(index.by_conversation("c3").is_empty());
    }

    #[test]
    fn corrupt_line_is_reported_with_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.jsonl");
        let good = serde_json::to_string(&fact("a", None)).unwrap();
        std::fs::write(&path, format!("{good}\n{{not json\n")).unwrap();
        assert!(matches!(
            MetadataIndex::open(&path),
            Err(VaultError::CorruptIndex { line: 2, .. })
        ));
        std::fs::write(&path, format!("{good}\n{good}\n")).unwrap();
        assert!(matches!(
            MetadataIndex::open(&path),
            Err(VaultError::CorruptIndex { line: 2, .. })
        ));
    }
}
