// Path: crates/vault/src/vault.rs
//! The vault: content store, metadata index, retriever and audit log behind
//! one handle.
//!
//! Layout under the configured root:
//!
//! ```text
//! objects/<prefix>/<rest>   content objects
//! objects/tmp/              in-flight writes
//! quarantine/               corrupt objects moved aside
//! index/records.jsonl       metadata records
//! audit/audit.jsonl         hash-chained audit log
//! vault.lock                held exclusively while the vault is open
//! ```
//!
//! Every mutation validates its input before writing anything. It then
//! stores content, appends all of its records in one write and appends the
//! audit entry. Records become visible only after the audit entry lands; if
//! it fails, the records are cut back out of the index file. Content written
//! by a failed mutation stays as an unreferenced object.

use crate::audit::{AuditAction, AuditLog};
use crate::index::MetadataIndex;
use crate::io::open_lock_file;
use crate::record::{Fact, Provenance, Record, RecordBody, RecordKind, RecordView};
use crate::retriever::{Candidate, Embedder, Retriever, SearchHit};
use crate::store::{ContentStore, IntegrityReport, PutResult};
use forge_crypto::hash::Digest;
use forge_crypto::verifier::FrameVerifier;
use forge_numerics::frame::{escape_value, to_canonical_text, unescape_value, Frame};
use forge_numerics::numeric::Decimal;
use forge_numerics::schema::{FrameKind, SchemaRegistry};
use forge_types::config::VaultConfig;
use forge_types::error::{StoreError, VaultError};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File};
use std::time::Duration;

const INDEX_FILE: &str = "index/records.jsonl";
const AUDIT_FILE: &str = "audit/audit.jsonl";
const LOCK_FILE: &str = "vault.lock";
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// What `import_text` created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub doc_id: String,
    pub digest: Digest,
    /// False when the same bytes were already stored.
    pub is_new_content: bool,
    pub chunk_ids: Vec<String>,
}

/// A search hit resolved to its record and text.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub record: Record,
    pub text: String,
    pub score: f32,
    pub lexical: f32,
    pub vector: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VaultStats {
    pub objects: u64,
    pub bytes: u64,
    pub docs: u64,
    pub chunks: u64,
    pub facts: u64,
    pub summaries: u64,
    pub tombstones: u64,
    pub audit_entries: u64,
}

/// Content integrity plus the state of the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultIntegrityReport {
    pub content: IntegrityReport,
    pub audit_entries: u64,
    /// First broken audit entry and what was wrong with it.
    pub audit_break: Option<(u64, String)>,
}

impl VaultIntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.content.is_clean() && self.audit_break.is_none()
    }
}

pub struct Vault {
    config: VaultConfig,
    store: ContentStore,
    index: MetadataIndex,
    audit: AuditLog,
    retriever: Retriever,
    schemas: SchemaRegistry,
    verifier: Option<FrameVerifier>,
    lock: File,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("root", &self.config.root)
            .field("records", &self.index.len())
            .field("audit_entries", &self.audit.len())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

impl Vault {
    /// Opens (creating if needed) the vault at `config.root`, taking an
    /// exclusive lock on it for the lifetime of the handle.
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        config.validate()?;
        let root = config.root.clone();
        fs::create_dir_all(root.join("index"))?;
        fs::create_dir_all(root.join("audit"))?;

        let lock = open_lock_file(&root.join(LOCK_FILE))?;
        if let Err(first) = lock.try_lock_exclusive() {
            tracing::debug!(target: "vault", "vault lock busy, retrying once: {first}");
            std::thread::sleep(LOCK_RETRY_DELAY);
            lock.try_lock_exclusive()?;
        }

        let store = ContentStore::open(&root, config.bucket_prefix)?;
        let index = MetadataIndex::open(&root.join(INDEX_FILE))?;
        let audit = AuditLog::open(&root.join(AUDIT_FILE))?;
        let retriever = Retriever::new(config.retrieval.clone());
        tracing::info!(
            target: "vault",
            root = %root.display(),
            records = index.len(),
            audit_entries = audit.len(),
            "vault opened"
        );
        Ok(Self {
            config,
            store,
            index,
            audit,
            retriever,
            schemas: SchemaRegistry::new(),
            verifier: None,
            lock,
        })
    }

    /// Enables signed import and export with this keyring.
    pub fn with_verifier(mut self, verifier: FrameVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Swaps the embedder used by hybrid search.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.retriever = Retriever::with_embedder(self.config.retrieval.clone(), embedder);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn verifier(&self) -> Option<&FrameVerifier> {
        self.verifier.as_ref()
    }

    /// Stores a text document and its chunks.
    pub fn import_text(
        &mut self,
        text: &str,
        title: Option<&str>,
        provenance: Provenance,
    ) -> Result<ImportReport, VaultError> {
        if text.trim().is_empty() {
            return Err(VaultError::Rejected("document is empty".into()));
        }
        let (report, records) = self.build_document(text, title, provenance)?;
        self.commit_unit(
            records,
            AuditAction::ImportText,
            Some(&report.doc_id),
            &format!("{} bytes, {} chunks", text.len(), report.chunk_ids.len()),
        )?;
        tracing::info!(target: "vault", doc_id = %report.doc_id, chunks = report.chunk_ids.len(), "document imported");
        Ok(report)
    }

    /// Stages `records`, appends the audit entry, then makes the records
    /// visible. A failed audit append rolls the staged records back.
    fn commit_unit(
        &mut self,
        records: Vec<Record>,
        action: AuditAction,
        record_id: Option<&str>,
        detail: &str,
    ) -> Result<(), VaultError> {
        let staged = self.index.stage(records)?;
        if let Err(e) = self.audit.append(action, record_id, detail) {
            if let Err(undo) = self.index.rollback(staged) {
                tracing::error!(target: "vault", "index rollback after failed {action} failed: {undo}");
            }
            return Err(e);
        }
        self.index.commit(staged);
        Ok(())
    }

    /// Stores the document bytes and builds its doc and chunk records.
    fn build_document(
        &mut self,
        text: &str,
        title: Option<&str>,
        provenance: Provenance,
    ) -> Result<(ImportReport, Vec<Record>), VaultError> {
        let ranges = chunk_ranges(text, self.config.chunk_size);
        let PutResult { digest, size, is_new } = self.store.put(text.as_bytes())?;
        let doc = Record::new(
            RecordBody::Doc {
                digest,
                title: title.map(str::to_string),
                byte_len: size,
            },
            provenance.clone(),
        );
        let doc_id = doc.id.clone();

        let mut records = Vec::with_capacity(ranges.len() + 1);
        records.push(doc);
        for (ordinal, (start, end)) in (0u32..).zip(ranges) {
            records.push(Record::new(
                RecordBody::Chunk {
                    doc_id: doc_id.clone(),
                    digest,
                    ordinal,
                    start: start as u64,
                    end: end as u64,
                },
                provenance.clone(),
            ));
        }
        let chunk_ids = records.iter().skip(1).map(|r| r.id.clone()).collect();
        let report = ImportReport {
            doc_id,
            digest,
            is_new_content: is_new,
            chunk_ids,
        };
        Ok((report, records))
    }

    /// Stores a fact as a canonical FACT frame and indexes it.
    pub fn put_fact(&mut self, fact: Fact, provenance: Provenance) -> Result<String, VaultError> {
        let frame = fact_frame(&fact)?;
        self.schemas
            .validate(&frame, FrameKind::Fact)
            .map_err(VaultError::Schema)?;
        let record = self.build_fact(fact, &to_canonical_text(&frame), provenance)?;
        let id = record.id.clone();
        self.commit_unit(vec![record], AuditAction::PutFact, Some(&id), "fact stored")?;
        tracing::info!(target: "vault", id = %id, "fact stored");
        Ok(id)
    }

    fn build_fact(&mut self, fact: Fact, frame_text: &str, provenance: Provenance) -> Result<Record, VaultError> {
        let digest = self.store.put(frame_text.as_bytes())?.digest;
        Ok(Record::new(RecordBody::Fact { fact, digest }, provenance))
    }

    /// Stores a summary of existing records.
    pub fn put_summary(
        &mut self,
        text: &str,
        covers: &[&str],
        provenance: Provenance,
    ) -> Result<String, VaultError> {
        if text.trim().is_empty() {
            return Err(VaultError::Rejected("summary is empty".into()));
        }
        if let Some(missing) = covers.iter().find(|id| self.index.get(id).is_none()) {
            return Err(VaultError::RecordNotFound((*missing).to_string()));
        }
        let digest = self.store.put(text.as_bytes())?.digest;
        let record = Record::new(
            RecordBody::Summary {
                digest,
                covers: covers.iter().map(|s| (*s).to_string()).collect(),
            },
            provenance,
        );
        let id = record.id.clone();
        self.commit_unit(
            vec![record],
            AuditAction::PutSummary,
            Some(&id),
            &format!("covers {} records", covers.len()),
        )?;
        Ok(id)
    }

    /// Soft-deletes a record by appending a tombstone. The content object
    /// stays; the record remains reachable through [`Vault::get_by_id`].
    pub fn forget(&mut self, id: &str, reason: &str) -> Result<String, VaultError> {
        let record = self
            .index
            .get(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
        if record.kind() == RecordKind::Tombstone {
            return Err(VaultError::TombstoneTarget(id.to_string()));
        }
        if self.index.tombstone_of(id).is_some() {
            return Err(VaultError::AlreadyForgotten(id.to_string()));
        }
        let tombstone = Record::new(
            RecordBody::Tombstone {
                target_id: id.to_string(),
                reason: reason.to_string(),
            },
            Provenance::default(),
        );
        let tombstone_id = tombstone.id.clone();
        self.commit_unit(vec![tombstone], AuditAction::Forget, Some(id), reason)?;
        tracing::info!(target: "vault", id = %id, reason = %reason, "record forgotten");
        Ok(tombstone_id)
    }

    /// The audit path: any record, forgotten or not, with its tombstone.
    pub fn get_by_id(&self, id: &str) -> Result<RecordView, VaultError> {
        self.index
            .view(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))
    }

    /// The text a record stands for.
    pub fn record_text(&self, id: &str) -> Result<String, VaultError> {
        let record = self
            .index
            .get(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
        let mut cache = HashMap::new();
        self.text_of(record, &mut cache)
    }

    fn text_of(&self, record: &Record, cache: &mut HashMap<Digest, Vec<u8>>) -> Result<String, VaultError> {
        let mut object = |digest: &Digest| -> Result<Vec<u8>, StoreError> {
            if let Some(bytes) = cache.get(digest) {
                return Ok(bytes.clone());
            }
            let bytes = self.store.get(digest)?;
            cache.insert(*digest, bytes.clone());
            Ok(bytes)
        };
        match &record.body {
            RecordBody::Fact { fact, .. } => Ok(fact.text()),
            RecordBody::Tombstone { reason, .. } => Ok(reason.clone()),
            RecordBody::Doc { digest, .. } | RecordBody::Summary { digest, .. } => {
                String::from_utf8(object(digest)?).map_err(|_| VaultError::NotText(record.id.clone()))
            }
            RecordBody::Chunk {
                digest, start, end, ..
            } => {
                let bytes = object(digest)?;
                let range = usize::try_from(*start).ok().zip(usize::try_from(*end).ok());
                let slice = range
                    .and_then(|(s, e)| bytes.get(s..e))
                    .ok_or(VaultError::ChunkRange {
                        start: *start,
                        end: *end,
                        len: bytes.len() as u64,
                    })?;
                String::from_utf8(slice.to_vec()).map_err(|_| VaultError::NotText(record.id.clone()))
            }
        }
    }

    fn owned(records: Vec<&Record>) -> Vec<Record> {
        records.into_iter().cloned().collect()
    }

    pub fn list_docs(&self) -> Vec<Record> {
        Self::owned(self.index.list_docs())
    }

    pub fn list_facts(&self) -> Vec<Record> {
        Self::owned(self.index.list_facts())
    }

    pub fn list_summaries(&self) -> Vec<Record> {
        Self::owned(self.index.list_summaries())
    }

    pub fn chunks_of(&self, doc_id: &str) -> Vec<Record> {
        Self::owned(self.index.chunks_of(doc_id))
    }

    pub fn by_conversation(&self, conversation_id: &str) -> Vec<Record> {
        Self::owned(self.index.by_conversation(conversation_id))
    }

    /// Lexical search over live chunks, facts and summaries.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, VaultError> {
        self.run_search(query, |candidates| self.retriever.search(query, candidates, limit))
    }

    /// Hybrid lexical and vector search with the configured `alpha`.
    pub fn search_hybrid(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, VaultError> {
        self.run_search(query, |candidates| {
            self.retriever.search_hybrid(query, candidates, limit)
        })
    }

    fn run_search(
        &self,
        query: &str,
        rank: impl FnOnce(&[Candidate<'_>]) -> Vec<SearchHit>,
    ) -> Result<Vec<SearchResult>, VaultError> {
        let mut cache = HashMap::new();
        let mut texts: Vec<(&Record, String)> = Vec::new();
        for record in self.index.live() {
            if !matches!(
                record.kind(),
                RecordKind::Chunk | RecordKind::Fact | RecordKind::Summary
            ) {
                continue;
            }
            match self.text_of(record, &mut cache) {
                Ok(text) => texts.push((record, text)),
                Err(e) => {
                    tracing::warn!(target: "vault", id = %record.id, "skipping unreadable record: {e}")
                }
            }
        }
        let candidates: Vec<Candidate<'_>> = texts
            .iter()
            .map(|(record, text)| Candidate {
                id: &record.id,
                created_at: record.created_at,
                text,
            })
            .collect();
        let by_id: HashMap<&str, &(&Record, String)> =
            texts.iter().map(|entry| (entry.0.id.as_str(), entry)).collect();
        let results = rank(&candidates)
            .into_iter()
            .filter_map(|hit| {
                by_id.get(hit.record_id.as_str()).map(|(record, text)| SearchResult {
                    record: Record::clone(record),
                    text: text.clone(),
                    score: hit.score,
                    lexical: hit.lexical,
                    vector: hit.vector,
                })
            })
            .collect::<Vec<_>>();
        tracing::debug!(target: "vault", query = %query, hits = results.len(), "search");
        Ok(results)
    }

    pub fn stats(&self) -> Result<VaultStats, VaultError> {
        let store = self.store.stats()?;
        let counts = self.index.counts();
        let count = |kind| counts.get(&kind).copied().unwrap_or(0);
        Ok(VaultStats {
            objects: store.objects,
            bytes: store.bytes,
            docs: count(RecordKind::Doc),
            chunks: count(RecordKind::Chunk),
            facts: count(RecordKind::Fact),
            summaries: count(RecordKind::Summary),
            tombstones: count(RecordKind::Tombstone),
            audit_entries: self.audit.len(),
        })
    }

    /// Re-hashes every content object and walks the audit chain. Neither
    /// kind of damage is raised; both end up in the report.
    pub fn verify_integrity(&self) -> Result<VaultIntegrityReport, VaultError> {
        let content = self.store.verify_integrity()?;
        let (audit_entries, audit_break) = match self.audit.verify() {
            Ok(count) => (count, None),
            Err(VaultError::AuditChain { seq, reason }) => (seq, Some((seq, reason))),
            Err(e) => return Err(e),
        };
        Ok(VaultIntegrityReport {
            content,
            audit_entries,
            audit_break,
        })
    }

    /// Moves every corrupt object into quarantine, returning their digests.
    pub fn quarantine_corrupt(&mut self) -> Result<Vec<String>, VaultError> {
        let report = self.store.verify_integrity()?;
        let mut moved = Vec::with_capacity(report.failed.len());
        for failure in &report.failed {
            let digest = Digest::from_hex(failure.digest())
                .ok_or_else(|| StoreError::InvalidDigest(failure.digest().to_string()))?;
            match self.store.quarantine(&digest) {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
            self.audit
                .append(AuditAction::Quarantine, None, &failure.to_string())?;
            moved.push(digest.to_hex());
        }
        Ok(moved)
    }

    /// Verifies and imports one signed frame. FACT frames become facts;
    /// every other kind becomes a document holding the canonical text.
    /// Nothing is written unless the signature and schema both check out.
    pub fn import_signed_frame(&mut self, text: &str, provenance: Provenance) -> Result<String, VaultError> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| VaultError::Rejected("no keyring configured for signed import".into()))?;
        let signed = verifier.accept(text)?;
        let kind = self
            .schemas
            .validate_declared(&signed.frame)
            .map_err(VaultError::Schema)?;
        let signer = signed.signature.signer_id.clone();
        let provenance = Provenance {
            source: provenance.source.or_else(|| Some("signed-frame".into())),
            agent: provenance.agent.or_else(|| Some(signer.clone())),
            conversation_id: provenance.conversation_id,
        };

        let (id, records) = if kind == FrameKind::Fact {
            let fact = fact_from_frame(&signed.frame)?;
            let record = self.build_fact(fact, &signed.to_text(), provenance)?;
            (record.id.clone(), vec![record])
        } else {
            let canonical = to_canonical_text(&signed.frame);
            let (report, records) = self.build_document(&canonical, Some(kind.name()), provenance)?;
            (report.doc_id, records)
        };
        self.commit_unit(
            records,
            AuditAction::ImportFrame,
            Some(&id),
            &format!("{} frame signed by {signer}", kind.name()),
        )?;
        tracing::info!(target: "vault", id = %id, kind = kind.name(), "signed frame imported");
        Ok(id)
    }

    /// Imports frames one at a time. A failure affects only its own frame.
    pub fn import_signed_frames<S: AsRef<str>>(
        &mut self,
        texts: &[S],
        provenance: &Provenance,
    ) -> Vec<Result<String, VaultError>> {
        texts
            .iter()
            .map(|text| {
                let result = self.import_signed_frame(text.as_ref(), provenance.clone());
                if let Err(e) = &result {
                    tracing::warn!(target: "vault", "signed frame not imported: {e}");
                }
                result
            })
            .collect()
    }

    /// A fact record as signed FACT frame text.
    pub fn export_fact_frame(&self, id: &str, signer_id: &str) -> Result<String, VaultError> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| VaultError::Rejected("no keyring configured for signed export".into()))?;
        let record = self
            .index
            .get(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
        let fact = record
            .as_fact()
            .ok_or_else(|| VaultError::Rejected(format!("record {id} is not a fact")))?;
        let signed = verifier.sign_frame(&fact_frame(fact)?, signer_id)?;
        Ok(signed.to_text())
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

/// Builds the FACT frame for a fact, escaping free text into header values.
pub fn fact_frame(fact: &Fact) -> Result<Frame, VaultError> {
    for (field, value) in [
        ("subject", &fact.subject),
        ("predicate", &fact.predicate),
        ("object", &fact.object),
    ] {
        if value.trim().is_empty() {
            return Err(VaultError::Rejected(format!("fact {field} is empty")));
        }
    }
    let mut builder = Frame::builder(FrameKind::Fact.name())
        .header("SUBJECT", escape_value(&fact.subject))
        .header("PREDICATE", escape_value(&fact.predicate))
        .header("OBJECT", escape_value(&fact.object));
    if let Some(confidence) = fact.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(VaultError::Rejected(format!(
                "confidence {confidence} is outside 0..=1"
            )));
        }
        builder = builder.header("CONFIDENCE", format!("{confidence:.3}"));
    }
    Ok(builder.build()?)
}

/// Reads a fact back out of a FACT frame.
pub fn fact_from_frame(frame: &Frame) -> Result<Fact, VaultError> {
    let field = |key: &str| -> Result<String, VaultError> {
        frame
            .get(key)
            .and_then(unescape_value)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| VaultError::Rejected(format!("FACT frame has no usable {key}")))
    };
    let confidence = match frame.get("CONFIDENCE") {
        Some(text) => {
            let value = text
                .parse::<Decimal>()
                .map_err(|e| VaultError::Rejected(format!("CONFIDENCE: {e}")))?
                .to_f64() as f32;
            if !(0.0..=1.0).contains(&value) {
                return Err(VaultError::Rejected(format!("confidence {value} is outside 0..=1")));
            }
            Some(value)
        }
        None => None,
    };
    Ok(Fact {
        subject: field("SUBJECT")?,
        predicate: field("PREDICATE")?,
        object: field("OBJECT")?,
        confidence,
    })
}

/// Splits text into byte ranges of at most `chunk_size` bytes, preferring
/// to cut just after whitespace and never inside a character. A character
/// wider than `chunk_size` gets a chunk of its own.
pub fn chunk_ranges(text: &str, chunk_size: usize) -> Vec<(usize, usize)> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let rest = text.get(start..).unwrap_or_default();
        if rest.len() <= chunk_size {
            ranges.push((start, text.len()));
            break;
        }
        let mut cut = chunk_size;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        } else if let Some((at, c)) = rest
            .get(..cut)
            .and_then(|window| window.char_indices().rev().find(|(_, c)| c.is_whitespace()))
        {
            if at > 0 {
                cut = at + c.len_utf8();
            }
        }
        ranges.push((start, start + cut));
        start += cut;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chunks_cover_text_and_respect_size() {
        let text = "alpha beta gamma delta epsilon";
        let ranges = chunk_ranges(text, 12);
        assert_eq!(ranges.first().map(|r| r.0), Some(0));
        assert_eq!(ranges.last().map(|r| r.1), Some(text.len()));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (s, e) in &ranges {
            assert!(e - s <= 12);
        }
        let pieces: Vec<&str> = ranges.iter().map(|(s, e)| &text[*s..*e]).collect();
        assert_eq!(pieces, vec!["alpha beta ", "gamma delta ", "epsilon"]);
    }

    #[test]
    fn chunks_never_split_characters() {
        let text = "ééééé";
        let ranges = chunk_ranges(text, 3);
        for (s, e) in &ranges {
            assert!(text.is_char_boundary(*s) && text.is_char_boundary(*e));
        }
        assert_eq!(ranges.len(), 5);
        assert_eq!(chunk_ranges("⟦", 1), vec![(0, 3)]);
        assert!(chunk_ranges("", 8).is_empty());
    }

    #[test]
    fn fact_frame_round_trips_free_text() {
        let fact = Fact::new("woolly mammoth", "lived in", "the [Pleistocene] 100%").with_confidence(0.9);
        let frame = fact_frame(&fact).unwrap();
        assert_eq!(frame.get("CONFIDENCE"), Some("0.900"));
        assert!(SchemaRegistry::new().validate(&frame, FrameKind::Fact).is_ok());
        let back = fact_from_frame(&frame).unwrap();
        assert_eq!(back.subject, "woolly mammoth");
        assert_eq!(back.object, "the [Pleistocene] 100%");
        assert!((back.confidence.unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn invalid_facts_are_rejected() {
        assert!(matches!(
            fact_frame(&Fact::new(" ", "is", "x")),
            Err(VaultError::Rejected(_))
        ));
        assert!(matches!(
            fact_frame(&Fact::new("a", "is", "x").with_confidence(1.5)),
            Err(VaultError::Rejected(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_chunks_tile_the_text(text in "[a-zé ⟦\\n]{0,200}", size in 1usize..40) {
            let ranges = chunk_ranges(&text, size);
            let mut at = 0;
            for (s, e) in &ranges {
                prop_assert_eq!(*s, at);
                prop_assert!(e > s);
                prop_assert!(text.is_char_boundary(*e));
                let piece = &text[*s..*e];
                prop_assert!(piece.len() <= size || piece.chars().count() == 1);
                at = *e;
            }
            prop_assert_eq!(at, text.len());
        }
    }
}
