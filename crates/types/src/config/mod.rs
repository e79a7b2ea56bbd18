// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for ForgeNumerics components.
//!
//! Nothing here is global: each component receives its config through its
//! constructor and owns it for the lifetime of the handle.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the extension dictionary allocator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DictionaryConfig {
    /// Where allocations are persisted. `None` keeps the dictionary in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Longest symbol combination the allocator may hand out (1..=3).
    #[serde(default = "default_max_combo_len")]
    pub max_combo_len: u8,
}

fn default_max_combo_len() -> u8 {
    3
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_combo_len: default_max_combo_len(),
        }
    }
}

impl DictionaryConfig {
    /// An in-memory dictionary with the full combination space.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A dictionary persisted at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Rejects a combination length outside 1..=3.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3).contains(&self.max_combo_len) {
            return Err(ConfigError::Invalid {
                field: "max_combo_len",
                reason: format!("{} is outside 1..=3", self.max_combo_len),
            });
        }
        Ok(())
    }
}

/// One trusted signer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// Identifier embedded in signature blocks.
    pub id: String,
    /// Hex-encoded HMAC secret.
    pub key_hex: String,
}

/// The set of signers a verifier trusts.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct KeyringConfig {
    /// Trusted signers, in no particular order.
    #[serde(default)]
    pub signers: Vec<SignerConfig>,
}

/// Ranking parameters for hybrid retrieval.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Weight of the lexical score in hybrid ranking; the vector score gets `1 - alpha`.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Dimension of the built-in feature-hashing embedder.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Result count used when a caller passes a limit of zero.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_alpha() -> f32 {
    0.5
}
fn default_embedding_dim() -> usize {
    256
}
fn default_limit() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            embedding_dim: default_embedding_dim(),
            default_limit: default_limit(),
        }
    }
}

/// Top-level configuration for a vault handle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VaultConfig {
    /// Root directory holding `objects/`, `index/`, `audit/` and `quarantine/`.
    pub root: PathBuf,
    /// Target chunk size in bytes when importing text.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of hex characters of the digest used as the bucket directory.
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: usize,
    /// Hybrid ranking parameters.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_chunk_size() -> usize {
    1024
}
fn default_bucket_prefix() -> usize {
    2
}

impl VaultConfig {
    /// A config rooted at `root` with every other field defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: default_chunk_size(),
            bucket_prefix: default_bucket_prefix(),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the vault cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero".into(),
            });
        }
        if !(1..=8).contains(&self.bucket_prefix) {
            return Err(ConfigError::Invalid {
                field: "bucket_prefix",
                reason: format!("{} is outside 1..=8", self.bucket_prefix),
            });
        }
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            return Err(ConfigError::Invalid {
                field: "retrieval.alpha",
                reason: format!("{} is outside 0.0..=1.0", self.retrieval.alpha),
            });
        }
        if self.retrieval.embedding_dim == 0 {
            return Err(ConfigError::Invalid {
                field: "retrieval.embedding_dim",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

impl KeyringConfig {
    /// Parses a TOML document of `[[signers]]` tables.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_config_defaults_fill_missing_fields() {
        let config = VaultConfig::from_toml_str("root = \"/tmp/vault\"\n").unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.bucket_prefix, 2);
        assert_eq!(config.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn vault_config_rejects_bad_alpha() {
        let text = "root = \"/tmp/v\"\n[retrieval]\nalpha = 1.5\n";
        let err = VaultConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "retrieval.alpha", .. }));
    }

    #[test]
    fn vault_config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.toml");
        std::fs::write(&path, "root = \"data\"\nchunk_size = 64\n").unwrap();
        let config = VaultConfig::load(&path).unwrap();
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.root, PathBuf::from("data"));
    }

    #[test]
    fn keyring_config_parses_signers() {
        let text = "[[signers]]\nid = \"alice\"\nkey_hex = \"00ff\"\n";
        let config = KeyringConfig::from_toml_str(text).unwrap();
        assert_eq!(config.signers.len(), 1);
        assert_eq!(config.signers[0].id, "alice");
    }

    #[test]
    fn dictionary_config_validates_length() {
        let mut config = DictionaryConfig::in_memory();
        assert!(config.validate().is_ok());
        config.max_combo_len = 4;
        assert!(config.validate().is_err());
    }
}
