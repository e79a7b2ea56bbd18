// Path: crates/types/src/error/mod.rs
//! Core error types for ForgeNumerics.
//!
//! Every concern owns a dedicated enum so callers can tell causes apart
//! without string matching. Codec and parse errors are always returned to
//! the caller; store-level integrity failures are collected into reports.

use std::fmt;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by the numeric profile codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    /// The value cannot be represented in the requested profile.
    #[error("{profile} value out of range: {detail}")]
    Range {
        /// Name of the profile that rejected the value.
        profile: &'static str,
        /// What exceeded the profile's domain.
        detail: String,
    },
    /// The token stream is not a well-formed encoding.
    #[error("malformed token at symbol {offset}: {reason} (expected one of {expected})")]
    MalformedToken {
        /// Symbol (not byte) offset inside the token.
        offset: usize,
        /// The offending symbol, if the token did not simply end early.
        found: Option<char>,
        /// The alphabet accepted at this position.
        expected: &'static str,
        /// Human-readable description of the defect.
        reason: String,
    },
}

impl ErrorCode for NumericError {
    fn code(&self) -> &'static str {
        match self {
            Self::Range { .. } => "NUMERIC_RANGE",
            Self::MalformedToken { .. } => "NUMERIC_MALFORMED_TOKEN",
        }
    }
}

/// A position inside frame text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (byte {})", self.line, self.column, self.offset)
    }
}

/// Malformed frame text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("frame parse error at {location}: expected {expected}; {hint}")]
pub struct ParseError {
    /// Where the scan stopped.
    pub location: Location,
    /// What the grammar expected at that point.
    pub expected: String,
    /// Recovery hint for the author of the frame.
    pub hint: String,
}

impl ErrorCode for ParseError {
    fn code(&self) -> &'static str {
        "FRAME_PARSE"
    }
}

/// Errors raised by the extension dictionary allocator.
#[derive(Error, Debug)]
pub enum DictionaryError {
    /// No free combination remains in the configured space.
    #[error("extension dictionary exhausted: all {capacity} combinations are claimed")]
    Exhausted {
        /// Size of the combination space that was searched.
        capacity: u64,
    },
    /// The persisted dictionary contains conflicting or unreadable entries.
    #[error("dictionary file corrupt at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number of the offending entry.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
    /// The word cannot be stored (empty or contains whitespace).
    #[error("invalid dictionary word: {0:?}")]
    InvalidWord(String),
    /// The symbol combination is not drawn from the extension alphabet.
    #[error("invalid symbol combination: {0:?}")]
    InvalidCombo(String),
    /// The dictionary lock file could not be acquired.
    #[error("dictionary lock contention: {0}")]
    Lock(String),
    /// An I/O failure while loading or persisting.
    #[error("dictionary I/O error: {0}")]
    Io(String),
}

impl ErrorCode for DictionaryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "DICTIONARY_EXHAUSTED",
            Self::Corrupt { .. } => "DICTIONARY_CORRUPT",
            Self::InvalidWord(_) => "DICTIONARY_INVALID_WORD",
            Self::InvalidCombo(_) => "DICTIONARY_INVALID_COMBO",
            Self::Lock(_) => "DICTIONARY_LOCK",
            Self::Io(_) => "DICTIONARY_IO",
        }
    }
}

/// Errors raised while packing or unpacking blob frames.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// The frame does not declare `TYPE=BLOB`.
    #[error("not a blob frame: {0}")]
    NotBlobFrame(String),
    /// The `CODEC` header names no known codec.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
    /// A required header is absent or not an unsigned integer.
    #[error("missing or invalid header: {0}")]
    Header(&'static str),
    /// A recorded length disagrees with the payload.
    #[error("{field} mismatch: header says {expected}, payload has {found}")]
    LengthMismatch {
        /// The header that disagreed.
        field: &'static str,
        /// Value recorded in the header.
        expected: u64,
        /// Value observed.
        found: u64,
    },
    /// A payload token is not a valid blob token.
    #[error("invalid blob token at payload index {index}: {source}")]
    Token {
        /// Index of the token inside the payload.
        index: usize,
        /// The underlying numeric codec failure.
        #[source]
        source: NumericError,
    },
    /// The compression backend failed.
    #[error("codec failure: {0}")]
    Codec(String),
}

impl ErrorCode for CompressionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotBlobFrame(_) => "COMPRESSION_NOT_BLOB",
            Self::UnknownCodec(_) => "COMPRESSION_UNKNOWN_CODEC",
            Self::Header(_) => "COMPRESSION_HEADER",
            Self::LengthMismatch { .. } => "COMPRESSION_LENGTH_MISMATCH",
            Self::Token { .. } => "COMPRESSION_TOKEN",
            Self::Codec(_) => "COMPRESSION_CODEC",
        }
    }
}

/// A single structural violation found by the schema registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The frame's `TYPE` header names a different kind.
    #[error("frame declares TYPE={declared}, validated as {requested}")]
    KindMismatch {
        /// Value of the `TYPE` header, or `<none>`.
        declared: String,
        /// Kind the caller asked to validate against.
        requested: String,
    },
    /// The `TYPE` header names no known schema.
    #[error("unknown frame type: {0}")]
    UnknownKind(String),
    /// No custom schema has been registered under this name.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    /// A required header key is absent.
    #[error("missing required header {key}")]
    MissingHeader {
        /// The absent key.
        key: String,
    },
    /// A header value does not have the declared field type.
    #[error("header {key}={found} is not a valid {expected}")]
    InvalidHeader {
        /// The offending key.
        key: String,
        /// Field type the schema declares.
        expected: String,
        /// Value found in the frame.
        found: String,
    },
    /// The payload has the wrong number of tokens.
    #[error("payload arity: expected {expected}, found {found}")]
    PayloadArity {
        /// Human-readable constraint, e.g. `exactly 6`.
        expected: String,
        /// Actual token count.
        found: usize,
    },
    /// A payload token has the wrong kind or form.
    #[error("payload token {index}: expected {expected}")]
    PayloadToken {
        /// Index of the token inside the payload.
        index: usize,
        /// Description of the accepted form.
        expected: String,
    },
}

impl ErrorCode for SchemaError {
    fn code(&self) -> &'static str {
        match self {
            Self::KindMismatch { .. } => "SCHEMA_KIND_MISMATCH",
            Self::UnknownKind(_) => "SCHEMA_UNKNOWN_KIND",
            Self::UnknownSchema(_) => "SCHEMA_UNKNOWN_SCHEMA",
            Self::MissingHeader { .. } => "SCHEMA_MISSING_HEADER",
            Self::InvalidHeader { .. } => "SCHEMA_INVALID_HEADER",
            Self::PayloadArity { .. } => "SCHEMA_PAYLOAD_ARITY",
            Self::PayloadToken { .. } => "SCHEMA_PAYLOAD_TOKEN",
        }
    }
}

/// Errors raised while signing or verifying frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The recomputed MAC does not match the signature block.
    #[error("signature mismatch for signer {signer_id}")]
    SignatureMismatch {
        /// Signer named in the block.
        signer_id: String,
    },
    /// The signer id is not present in the keyring.
    #[error("unknown signer: {0}")]
    UnknownSigner(String),
    /// The text carries no signature block.
    #[error("frame is not signed")]
    Unsigned,
    /// The signature block is present but not well-formed.
    #[error("malformed signature block: {0}")]
    MalformedSignature(String),
    /// The signer id cannot be embedded in a signature block.
    #[error("invalid signer id: {0:?}")]
    InvalidSignerId(String),
    /// A key could not be decoded or is empty.
    #[error("invalid key material for signer {0}")]
    InvalidKey(String),
    /// The frame body could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ErrorCode for VerifyError {
    fn code(&self) -> &'static str {
        match self {
            Self::SignatureMismatch { .. } => "VERIFY_SIGNATURE_MISMATCH",
            Self::UnknownSigner(_) => "VERIFY_UNKNOWN_SIGNER",
            Self::Unsigned => "VERIFY_UNSIGNED",
            Self::MalformedSignature(_) => "VERIFY_MALFORMED_SIGNATURE",
            Self::InvalidSignerId(_) => "VERIFY_INVALID_SIGNER_ID",
            Self::InvalidKey(_) => "VERIFY_INVALID_KEY",
            Self::Parse(_) => "VERIFY_PARSE",
        }
    }
}

/// Errors raised while verifying a hash-chained sequence of signed frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The entry's `PREV_ENTRY_HASH` does not match its predecessor's digest.
    #[error("chain broken at entry {index}: expected prev hash {expected}, found {found}")]
    Broken {
        /// Position of the first disrupted entry.
        index: usize,
        /// Digest of the preceding entry (hex).
        expected: String,
        /// Value carried by the entry (hex, or `<missing>`).
        found: String,
    },
    /// The entry's own signature failed.
    #[error("entry {index} failed verification: {source}")]
    Entry {
        /// Position of the failing entry.
        index: usize,
        /// Why it failed.
        #[source]
        source: VerifyError,
    },
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::Broken { .. } => "CHAIN_BROKEN",
            Self::Entry { .. } => "CHAIN_ENTRY_INVALID",
        }
    }
}

/// A stored object whose bytes no longer hash to its address.
///
/// Integrity failures are reported in aggregate, never raised mid-scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// The object's bytes hash to a different digest.
    #[error("object {digest} is corrupt: content hashes to {actual}")]
    DigestMismatch {
        /// Address of the object (hex).
        digest: String,
        /// Digest of the bytes actually on disk (hex).
        actual: String,
    },
    /// The object could not be read at all.
    #[error("object {digest} unreadable: {reason}")]
    Unreadable {
        /// Address of the object (hex).
        digest: String,
        /// The I/O failure.
        reason: String,
    },
}

impl IntegrityError {
    /// The hex address of the affected object.
    pub fn digest(&self) -> &str {
        match self {
            Self::DigestMismatch { digest, .. } | Self::Unreadable { digest, .. } => digest,
        }
    }
}

impl ErrorCode for IntegrityError {
    fn code(&self) -> &'static str {
        match self {
            Self::DigestMismatch { .. } => "INTEGRITY_DIGEST_MISMATCH",
            Self::Unreadable { .. } => "INTEGRITY_UNREADABLE",
        }
    }
}

/// Errors raised by the content-addressed store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object is stored under this digest.
    #[error("content not found for digest: {0}")]
    NotFound(String),
    /// The string is not a valid hex digest.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    /// The object exists but its bytes no longer match its digest.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// An I/O failure, surfaced after one retry.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "STORE_NOT_FOUND",
            Self::InvalidDigest(_) => "STORE_INVALID_DIGEST",
            Self::Integrity(_) => "STORE_INTEGRITY",
            Self::Io(_) => "STORE_IO",
        }
    }
}

/// Errors raised by the metadata index, audit log and vault façade.
#[derive(Error, Debug)]
pub enum VaultError {
    /// No record has this id.
    #[error("record not found: {0}")]
    RecordNotFound(String),
    /// The record already carries a tombstone.
    #[error("record already forgotten: {0}")]
    AlreadyForgotten(String),
    /// A tombstone cannot itself be forgotten.
    #[error("record {0} is a tombstone")]
    TombstoneTarget(String),
    /// Chunk offsets fall outside the parent document.
    #[error("chunk range {start}..{end} outside document of {len} bytes")]
    ChunkRange {
        /// Start offset.
        start: u64,
        /// End offset (exclusive).
        end: u64,
        /// Length of the parent document.
        len: u64,
    },
    /// A persisted record line could not be decoded.
    #[error("index file corrupt at line {line}: {reason}")]
    CorruptIndex {
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
    /// The audit log's hash chain is broken.
    #[error("audit chain broken at seq {seq}: {reason}")]
    AuditChain {
        /// Sequence number of the first bad entry.
        seq: u64,
        /// What did not match.
        reason: String,
    },
    /// A stored document is not valid UTF-8.
    #[error("document {0} is not valid UTF-8")]
    NotText(String),
    /// Input was refused before anything was written.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The vault configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Content store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Signing or verification failure.
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// Frame text failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Structural validation failed.
    #[error("schema validation failed: {}", join_schema_errors(.0))]
    Schema(Vec<SchemaError>),
    /// Serialization of a record failed.
    #[error("serialization error: {0}")]
    Serde(String),
    /// Disk I/O failure.
    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_schema_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ErrorCode for VaultError {
    fn code(&self) -> &'static str {
        match self {
            Self::RecordNotFound(_) => "VAULT_RECORD_NOT_FOUND",
            Self::AlreadyForgotten(_) => "VAULT_ALREADY_FORGOTTEN",
            Self::TombstoneTarget(_) => "VAULT_TOMBSTONE_TARGET",
            Self::ChunkRange { .. } => "VAULT_CHUNK_RANGE",
            Self::CorruptIndex { .. } => "VAULT_CORRUPT_INDEX",
            Self::AuditChain { .. } => "VAULT_AUDIT_CHAIN",
            Self::NotText(_) => "VAULT_NOT_TEXT",
            Self::Rejected(_) => "VAULT_REJECTED",
            Self::Config(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Verify(e) => e.code(),
            Self::Parse(e) => e.code(),
            Self::Schema(_) => "VAULT_SCHEMA",
            Self::Serde(_) => "VAULT_SERDE",
            Self::Io(_) => "VAULT_IO",
        }
    }
}

/// Errors raised while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The TOML is invalid or does not match the expected structure.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    /// A value is syntactically fine but semantically out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Name of the field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "CONFIG_IO",
            Self::Toml(_) => "CONFIG_TOML",
            Self::Invalid { .. } => "CONFIG_INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_for_verification_causes() {
        let mismatch = VerifyError::SignatureMismatch {
            signer_id: "alice".into(),
        };
        let unknown = VerifyError::UnknownSigner("mallory".into());
        assert_ne!(mismatch.code(), unknown.code());
        assert_eq!(unknown.code(), "VERIFY_UNKNOWN_SIGNER");
    }

    #[test]
    fn vault_error_forwards_inner_codes() {
        let err = VaultError::from(StoreError::NotFound("ab".into()));
        assert_eq!(err.code(), "STORE_NOT_FOUND");
    }

    #[test]
    fn parse_error_display_includes_location() {
        let err = ParseError {
            location: Location {
                offset: 12,
                line: 2,
                column: 5,
            },
            expected: "`∷`".into(),
            hint: "missing payload separator".into(),
        };
        let text = err.to_string();
        assert!(text.contains("2:5"));
        assert!(text.contains("missing payload separator"));
    }
}
