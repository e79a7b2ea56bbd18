// Path: crates/crypto/src/keyring.rs
//! Trusted signer secrets.

use forge_types::config::KeyringConfig;
use forge_types::error::VerifyError;
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// HMAC key material, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(text: &str) -> Option<Self> {
        hex::decode(text).ok().filter(|b| !b.is_empty()).map(Self)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes>)", self.0.len())
    }
}

/// Signer ids appear inside `[SIG|…]` blocks, so they are restricted to
/// characters that cannot collide with the block syntax.
pub fn is_valid_signer_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
}

/// Maps signer ids to their secrets.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: HashMap<String, SecretKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a keyring from configuration, rejecting bad ids or key hex.
    pub fn from_config(config: &KeyringConfig) -> Result<Self, VerifyError> {
        let mut keyring = Self::new();
        for signer in &config.signers {
            let key = SecretKey::from_hex(&signer.key_hex)
                .ok_or_else(|| VerifyError::InvalidKey(signer.id.clone()))?;
            keyring.insert(&signer.id, key)?;
        }
        log::debug!("keyring loaded with {} signers", keyring.len());
        Ok(keyring)
    }

    /// Adds or replaces a signer.
    pub fn insert(&mut self, signer_id: &str, key: SecretKey) -> Result<(), VerifyError> {
        if !is_valid_signer_id(signer_id) {
            return Err(VerifyError::InvalidSignerId(signer_id.to_string()));
        }
        if key.0.is_empty() {
            return Err(VerifyError::InvalidKey(signer_id.to_string()));
        }
        self.keys.insert(signer_id.to_string(), key);
        Ok(())
    }

    pub fn remove(&mut self, signer_id: &str) -> bool {
        self.keys.remove(signer_id).is_some()
    }

    pub fn get(&self, signer_id: &str) -> Option<&SecretKey> {
        self.keys.get(signer_id)
    }

    pub fn contains(&self, signer_id: &str) -> bool {
        self.keys.contains_key(signer_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_types::config::SignerConfig;

    #[test]
    fn builds_from_config() {
        let config = KeyringConfig {
            signers: vec![SignerConfig {
                id: "alice".into(),
                key_hex: "00ff10".into(),
            }],
        };
        let keyring = Keyring::from_config(&config).unwrap();
        assert!(keyring.contains("alice"));
        assert_eq!(keyring.get("alice").unwrap().expose(), &[0x00, 0xff, 0x10]);
    }

    #[test]
    fn rejects_bad_material() {
        let bad_hex = KeyringConfig {
            signers: vec![SignerConfig {
                id: "alice".into(),
                key_hex: "zz".into(),
            }],
        };
        assert!(matches!(
            Keyring::from_config(&bad_hex),
            Err(VerifyError::InvalidKey(_))
        ));

        let mut keyring = Keyring::new();
        assert!(matches!(
            keyring.insert("bad|id", SecretKey::new(vec![1])),
            Err(VerifyError::InvalidSignerId(_))
        ));
        assert!(keyring.insert("ok", SecretKey::new(Vec::new())).is_err());
    }

    #[test]
    fn debug_does_not_print_secret() {
        let key = SecretKey::new(vec![0xAB; 4]);
        assert_eq!(format!("{key:?}"), "SecretKey(<4 bytes>)");
    }
}
