// Path: crates/crypto/src/signature.rs
//! Signature blocks and the signed-frame envelope.
//!
//! A signed frame is the canonical text of a frame with one block of the
//! form `[SIG|<mac hex>|<signer id>|<timestamp ms>]` inserted directly
//! before the closing marker. The frame grammar itself rejects bracketed
//! tokens, so the block has to be split off before the body is parsed.

use crate::hash::{sha256, Digest};
use crate::keyring::is_valid_signer_id;
use forge_numerics::frame::{self, Frame, FRAME_CLOSE};
use forge_types::error::VerifyError;
use std::fmt;

const BLOCK_OPEN: &str = "[SIG|";
const BLOCK_CLOSE: char = ']';
const MAC_HEX_LEN: usize = 64;

/// The parsed contents of a `[SIG|…]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Lowercase hex HMAC-SHA256.
    pub mac: String,
    pub signer_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Signature {
    fn parse_block(block: &str) -> Result<Self, VerifyError> {
        let malformed = |why: &str| VerifyError::MalformedSignature(format!("{why}: {block}"));
        let inner = block
            .strip_prefix(BLOCK_OPEN)
            .and_then(|b| b.strip_suffix(BLOCK_CLOSE))
            .ok_or_else(|| malformed("not a signature block"))?;
        let mut parts = inner.split('|');
        let (Some(mac), Some(signer_id), Some(timestamp), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected three fields"));
        };
        let mac_ok = mac.len() == MAC_HEX_LEN
            && mac
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !mac_ok {
            return Err(malformed("mac is not 64 lowercase hex characters"));
        }
        if !is_valid_signer_id(signer_id) {
            return Err(VerifyError::InvalidSignerId(signer_id.to_string()));
        }
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("timestamp is not a decimal integer"));
        }
        let timestamp_ms = timestamp
            .parse()
            .map_err(|_| malformed("timestamp out of range"))?;
        Ok(Self {
            mac: mac.to_string(),
            signer_id: signer_id.to_string(),
            timestamp_ms,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{BLOCK_OPEN}{}|{}|{}{BLOCK_CLOSE}",
            self.mac, self.signer_id, self.timestamp_ms
        )
    }
}

/// Splits signed text into the unsigned body text and its signature.
///
/// Exactly one block must sit directly before the final `⟧`. The body is
/// returned unparsed so callers can tell a broken envelope from a body that
/// was tampered into invalid syntax.
pub fn split_signed(text: &str) -> Result<(String, Signature), VerifyError> {
    let occurrences = text.matches(BLOCK_OPEN).count();
    if occurrences == 0 {
        return Err(VerifyError::Unsigned);
    }
    if occurrences > 1 {
        return Err(VerifyError::MalformedSignature(format!(
            "{occurrences} signature blocks; exactly one is allowed"
        )));
    }
    let before_close = text
        .trim_end()
        .strip_suffix(FRAME_CLOSE)
        .map(str::trim_end)
        .filter(|t| t.ends_with(BLOCK_CLOSE))
        .ok_or_else(|| {
            VerifyError::MalformedSignature(
                "the signature block must directly precede the closing marker".into(),
            )
        })?;
    let start = before_close.rfind(BLOCK_OPEN).ok_or_else(|| {
        VerifyError::MalformedSignature("the signature block must directly precede the closing marker".into())
    })?;
    let (head, block) = (
        before_close.get(..start).unwrap_or_default(),
        before_close.get(start..).unwrap_or_default(),
    );
    if !head.ends_with(char::is_whitespace) {
        return Err(VerifyError::MalformedSignature(
            "the signature block must be separated from the payload".into(),
        ));
    }
    let signature = Signature::parse_block(block)?;
    Ok((format!("{} {FRAME_CLOSE}", head.trim_end()), signature))
}

/// The bytes a signature covers: canonical unsigned text, signer and
/// timestamp separated by the ASCII unit separator.
pub(crate) fn signing_payload(canonical: &str, signer_id: &str, timestamp_ms: u64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(canonical.len() + signer_id.len() + 22);
    payload.extend_from_slice(canonical.as_bytes());
    payload.push(0x1F);
    payload.extend_from_slice(signer_id.as_bytes());
    payload.push(0x1F);
    payload.extend_from_slice(timestamp_ms.to_string().as_bytes());
    payload
}

/// A frame together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFrame {
    pub frame: Frame,
    pub signature: Signature,
}

impl SignedFrame {
    /// Parses signed text without checking the MAC.
    pub fn parse(text: &str) -> Result<Self, VerifyError> {
        let (body, signature) = split_signed(text)?;
        let frame = frame::parse(&body)?;
        Ok(Self { frame, signature })
    }

    /// Canonical text of the frame with the signature block before `⟧`.
    pub fn to_text(&self) -> String {
        let canonical = frame::to_canonical_text(&self.frame);
        let head = canonical
            .strip_suffix(FRAME_CLOSE)
            .unwrap_or(&canonical)
            .trim_end();
        format!("{head} {} {FRAME_CLOSE}", self.signature)
    }

    /// Digest of the signed text; what the next chain entry points at.
    pub fn digest(&self) -> Digest {
        sha256(self.to_text().as_bytes())
    }
}

impl fmt::Display for SignedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> String {
        format!("[SIG|{}|alice|1700000000000]", "ab".repeat(32))
    }

    #[test]
    fn splits_body_and_block() {
        let text = format!("⟦ TYPE=FACT ∷ x {} ⟧", block());
        let (body, sig) = split_signed(&text).unwrap();
        assert_eq!(body, "⟦ TYPE=FACT ∷ x ⟧");
        assert_eq!(sig.signer_id, "alice");
        assert_eq!(sig.timestamp_ms, 1_700_000_000_000);
        assert_eq!(sig.to_string(), block());
    }

    #[test]
    fn block_must_precede_close_marker() {
        let text = format!("⟦ TYPE=FACT ∷ {} x ⟧", block());
        assert!(matches!(
            split_signed(&text),
            Err(VerifyError::MalformedSignature(_))
        ));
    }

    #[test]
    fn exactly_one_block() {
        let text = format!("⟦ ∷ {} {} ⟧", block(), block());
        assert!(matches!(
            split_signed(&text),
            Err(VerifyError::MalformedSignature(_))
        ));
        assert!(matches!(
            split_signed("⟦ ∷ x ⟧"),
            Err(VerifyError::Unsigned)
        ));
    }

    #[test]
    fn malformed_fields_are_rejected() {
        for bad in [
            "[SIG|abc|alice|1]".to_string(),
            format!("[SIG|{}|alice]", "ab".repeat(32)),
            format!("[SIG|{}|alice|12x]", "ab".repeat(32)),
            format!("[SIG|{}|alice|1|2]", "ab".repeat(32)),
            format!("[SIG|{}|alice|1]", "AB".repeat(32)),
        ] {
            let text = format!("⟦ ∷ {bad} ⟧");
            assert!(split_signed(&text).is_err(), "{bad}");
        }
        let text = format!("⟦ ∷ [SIG|{}|bad id|1] ⟧", "ab".repeat(32));
        assert!(split_signed(&text).is_err());
    }

    #[test]
    fn signed_frame_text_round_trips() {
        let text = format!("⟦ B=2 A=1 ∷ x {} ⟧", block());
        let signed = SignedFrame::parse(&text).unwrap();
        let canonical = signed.to_text();
        assert_eq!(canonical, format!("⟦ A=1 B=2 ∷ x {} ⟧", block()));
        assert_eq!(SignedFrame::parse(&canonical).unwrap().to_text(), canonical);
    }

    #[test]
    fn payload_layout() {
        let payload = signing_payload("⟦ ∷ ⟧", "alice", 42);
        let mut expected = "⟦ ∷ ⟧".as_bytes().to_vec();
        expected.extend_from_slice(b"\x1falice\x1f42");
        assert_eq!(payload, expected);
    }
}
