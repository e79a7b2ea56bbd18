// Path: crates/crypto/src/verifier.rs
//! HMAC-SHA256 frame signing, verification and hash-chained sequences.

use crate::hash::Digest;
use crate::keyring::{is_valid_signer_id, Keyring, SecretKey};
use crate::signature::{signing_payload, split_signed, Signature, SignedFrame};
use forge_numerics::frame::{self, Frame};
use forge_types::error::{ChainError, VerifyError};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the digest of the previous entry in a chain.
pub const PREV_ENTRY_HASH: &str = "PREV_ENTRY_HASH";

/// Outcome of checking one signed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    TamperDetected,
    UnknownSigner,
}

/// What verification found, along with the claimed signer and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub signer_id: String,
    pub timestamp_ms: u64,
}

impl VerificationResult {
    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    /// Turns anything but `Verified` into an error.
    pub fn require_verified(self) -> Result<Self, VerifyError> {
        match self.status {
            VerificationStatus::Verified => Ok(self),
            VerificationStatus::TamperDetected => Err(VerifyError::SignatureMismatch {
                signer_id: self.signer_id,
            }),
            VerificationStatus::UnknownSigner => Err(VerifyError::UnknownSigner(self.signer_id)),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn compute_mac(key: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, VerifyError> {
    let mut mac = HmacSha256::new_from_slice(key.expose())
        .map_err(|e| VerifyError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Signs and verifies frames against a keyring.
#[derive(Debug, Clone, Default)]
pub struct FrameVerifier {
    keyring: Keyring,
}

impl FrameVerifier {
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn keyring_mut(&mut self) -> &mut Keyring {
        &mut self.keyring
    }

    /// Signs a frame with the current time.
    pub fn sign_frame(&self, frame: &Frame, signer_id: &str) -> Result<SignedFrame, VerifyError> {
        self.sign_frame_at(frame, signer_id, now_ms())
    }

    /// Signs a frame's canonical form with an explicit timestamp.
    pub fn sign_frame_at(
        &self,
        frame: &Frame,
        signer_id: &str,
        timestamp_ms: u64,
    ) -> Result<SignedFrame, VerifyError> {
        if !is_valid_signer_id(signer_id) {
            return Err(VerifyError::InvalidSignerId(signer_id.to_string()));
        }
        let key = self
            .keyring
            .get(signer_id)
            .ok_or_else(|| VerifyError::UnknownSigner(signer_id.to_string()))?;
        let canonical = frame::canonicalize(frame);
        let text = frame::serialize(&canonical);
        let mac = compute_mac(key, &signing_payload(&text, signer_id, timestamp_ms))?;
        log::debug!("signed {} bytes of frame text as {signer_id}", text.len());
        Ok(SignedFrame {
            frame: canonical,
            signature: Signature {
                mac: hex::encode(mac),
                signer_id: signer_id.to_string(),
                timestamp_ms,
            },
        })
    }

    /// Verifies signed frame text.
    ///
    /// An absent or malformed signature block is an error. Everything else
    /// yields a result: a body that no longer parses, or parses to content
    /// the MAC does not cover, is `TamperDetected`.
    pub fn verify_frame(&self, text: &str) -> Result<VerificationResult, VerifyError> {
        let (body, signature) = split_signed(text)?;
        let result = |status| VerificationResult {
            status,
            signer_id: signature.signer_id.clone(),
            timestamp_ms: signature.timestamp_ms,
        };
        let Some(key) = self.keyring.get(&signature.signer_id) else {
            log::warn!("frame signed by unknown signer {}", signature.signer_id);
            return Ok(result(VerificationStatus::UnknownSigner));
        };
        let canonical = match frame::canonical_text(&body) {
            Ok(canonical) => canonical,
            Err(e) => {
                log::warn!("signed frame body no longer parses: {e}");
                return Ok(result(VerificationStatus::TamperDetected));
            }
        };
        let status = if mac_matches(key, &canonical, &signature)? {
            VerificationStatus::Verified
        } else {
            log::warn!("signature mismatch for signer {}", signature.signer_id);
            VerificationStatus::TamperDetected
        };
        Ok(result(status))
    }

    /// Verifies an already parsed signed frame.
    pub fn verify_signed(&self, signed: &SignedFrame) -> Result<VerificationResult, VerifyError> {
        self.verify_frame(&signed.to_text())
    }

    /// Verifies and parses signed text, failing unless the MAC checks out.
    pub fn accept(&self, text: &str) -> Result<SignedFrame, VerifyError> {
        self.verify_frame(text)?.require_verified()?;
        SignedFrame::parse(text)
    }

    /// Verifies a chain of signed frames in order.
    ///
    /// Every entry must verify and carry the digest of its predecessor in
    /// `PREV_ENTRY_HASH` (all zeros for the first). Fails at the first
    /// disrupted position, so removals and reorders are reported where
    /// they happened.
    pub fn verify_chain<S: AsRef<str>>(&self, entries: &[S]) -> Result<Vec<SignedFrame>, ChainError> {
        let mut expected = Digest::GENESIS;
        let mut verified = Vec::with_capacity(entries.len());
        for (index, text) in entries.iter().enumerate() {
            let signed = self
                .accept(text.as_ref())
                .map_err(|source| ChainError::Entry { index, source })?;
            let found = signed.frame.get(PREV_ENTRY_HASH);
            if found != Some(expected.to_hex().as_str()) {
                return Err(ChainError::Broken {
                    index,
                    expected: expected.to_hex(),
                    found: found.unwrap_or("<missing>").to_string(),
                });
            }
            expected = signed.digest();
            verified.push(signed);
        }
        log::debug!("verified chain of {} entries", verified.len());
        Ok(verified)
    }
}

fn mac_matches(key: &SecretKey, canonical: &str, signature: &Signature) -> Result<bool, VerifyError> {
    let computed = compute_mac(
        key,
        &signing_payload(canonical, &signature.signer_id, signature.timestamp_ms),
    )?;
    let Ok(claimed) = hex::decode(&signature.mac) else {
        return Ok(false);
    };
    if claimed.len() != computed.len() {
        return Ok(false);
    }
    Ok(claimed.ct_eq(computed.as_slice()).into())
}

/// Points `frame` at its predecessor by setting `PREV_ENTRY_HASH`.
pub fn link(frame: &mut Frame, prev: Option<&SignedFrame>) -> Result<(), VerifyError> {
    let digest = prev.map_or(Digest::GENESIS, SignedFrame::digest);
    frame.set_header(PREV_ENTRY_HASH, &digest.to_hex())?;
    Ok(())
}

#[cfg(test)]
mod tests;
