// Path: crates/vault/src/record.rs
//! Typed metadata records.

use forge_crypto::hash::Digest;
use serde::{Deserialize, Serialize};

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Provenance {
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// A subject/predicate/object statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// In `[0, 1]` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// The text retrieval scores a fact against.
    pub fn text(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// The typed part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    /// A whole imported document; its bytes are the object at `digest`.
    Doc {
        digest: Digest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        byte_len: u64,
    },
    /// A byte range `start..end` of a document's object.
    Chunk {
        doc_id: String,
        digest: Digest,
        ordinal: u32,
        start: u64,
        end: u64,
    },
    /// A fact; `digest` addresses its FACT frame text.
    Fact { fact: Fact, digest: Digest },
    /// Free text summarising other records.
    Summary {
        digest: Digest,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        covers: Vec<String>,
    },
    /// Soft deletion of `target_id`.
    Tombstone { target_id: String, reason: String },
}

impl RecordBody {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordBody::Doc { .. } => RecordKind::Doc,
            RecordBody::Chunk { .. } => RecordKind::Chunk,
            RecordBody::Fact { .. } => RecordKind::Fact,
            RecordBody::Summary { .. } => RecordKind::Summary,
            RecordBody::Tombstone { .. } => RecordKind::Tombstone,
        }
    }

    /// The content object this record points at, if any.
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            RecordBody::Doc { digest, .. }
            | RecordBody::Chunk { digest, .. }
            | RecordBody::Fact { digest, .. }
            | RecordBody::Summary { digest, .. } => Some(digest),
            RecordBody::Tombstone { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Doc,
    Chunk,
    Fact,
    Summary,
    Tombstone,
}

/// One line of the metadata index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl Record {
    /// A new record with a fresh UUID v4 id, stamped now.
    pub fn new(body: RecordBody, provenance: Provenance) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: forge_crypto::verifier::now_ms(),
            provenance,
            body,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.body.kind()
    }

    pub fn as_fact(&self) -> Option<&Fact> {
        match &self.body {
            RecordBody::Fact { fact, .. } => Some(fact),
            _ => None,
        }
    }
}

/// A record as seen through the audit path: with its tombstone, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView {
    pub record: Record,
    pub tombstone: Option<Record>,
}

impl RecordView {
    pub fn is_forgotten(&self) -> bool {
        self.tombstone.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_crypto::hash::sha256;

    #[test]
    fn fact_record_json_shape() {
        let record = Record {
            id: "r1".into(),
            created_at: 5,
            provenance: Provenance::source("chat").with_conversation("c9"),
            body: RecordBody::Fact {
                fact: Fact::new("sky", "is", "blue").with_confidence(0.5),
                digest: sha256(b"x"),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "fact");
        assert_eq!(json["fact"]["subject"], "sky");
        assert_eq!(json["fact"]["confidence"], 0.5);
        assert_eq!(json["digest"], sha256(b"x").to_hex());
        assert_eq!(json["provenance"]["conversation_id"], "c9");
        assert!(json["provenance"].get("agent").is_none());
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn new_records_get_distinct_ids() {
        let body = RecordBody::Tombstone {
            target_id: "x".into(),
            reason: "duplicate".into(),
        };
        let a = Record::new(body.clone(), Provenance::default());
        let b = Record::new(body, Provenance::default());
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind(), RecordKind::Tombstone);
        assert!(a.body.digest().is_none());
    }
}
