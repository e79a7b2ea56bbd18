//! Tests for frame signing, tamper detection and chains.

use super::*;
use crate::hash::sha256;
use forge_numerics::frame::Token;
use forge_numerics::numeric::NumericValue;
use proptest::prelude::*;

const T0: u64 = 1_700_000_000_000;

fn verifier() -> FrameVerifier {
    let mut keyring = Keyring::new();
    keyring
        .insert("alice", SecretKey::new(b"alice-secret-key".to_vec()))
        .unwrap();
    keyring
        .insert("bob", SecretKey::new(b"bob-secret-key".to_vec()))
        .unwrap();
    FrameVerifier::new(keyring)
}

fn fact() -> Frame {
    Frame::builder("FACT")
        .header("SUBJECT", "sky")
        .header("PREDICATE", "is")
        .header("OBJECT", "blue")
        .token(NumericValue::Unsigned(7))
        .word("observed")
        .build()
        .unwrap()
}

#[test]
fn signed_frame_verifies() {
    let v = verifier();
    let signed = v.sign_frame_at(&fact(), "alice", T0).unwrap();
    let result = v.verify_frame(&signed.to_text()).unwrap();
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(result.signer_id, "alice");
    assert_eq!(result.timestamp_ms, T0);
    assert!(result.require_verified().is_ok());
}

#[test]
fn embedded_signature_markers_never_reach_a_signable_frame() {
    let built = Frame::builder("FACT")
        .header("SUBJECT", "sky")
        .word("x[SIG|y")
        .build();
    assert!(built.is_err());
    assert!(Token::word("x]").is_err());

    let escaped = frame::escape_value("x[SIG|y");
    let v = verifier();
    let with_escaped = Frame::builder("FACT")
        .header("SUBJECT", escaped)
        .header("PREDICATE", "is")
        .header("OBJECT", "blue")
        .build()
        .unwrap();
    let signed = v.sign_frame_at(&with_escaped, "alice", T0).unwrap();
    assert!(v.verify_frame(&signed.to_text()).unwrap().is_verified());
}

#[test]
fn verification_is_insensitive_to_formatting() {
    let v = verifier();
    let signed = v.sign_frame_at(&fact(), "alice", T0).unwrap();
    let text = signed.to_text().replace(' ', "\n  ");
    assert!(v.verify_frame(&text).unwrap().is_verified());
}

#[test]
fn mac_covers_canonical_text_signer_and_time() {
    let v = verifier();
    let signed = v.sign_frame_at(&fact(), "alice", T0).unwrap();
    let key = v.keyring().get("alice").unwrap();
    let canonical = frame::to_canonical_text(&fact());
    let expected = compute_mac(key, &signing_payload(&canonical, "alice", T0)).unwrap();
    assert_eq!(signed.signature.mac, hex::encode(expected));
}

#[test]
fn payload_edit_is_tamper() {
    let v = verifier();
    let text = v.sign_frame_at(&fact(), "alice", T0).unwrap().to_text();
    let tampered = text.replace("OBJECT=blue", "OBJECT=gray");
    let result = v.verify_frame(&tampered).unwrap();
    assert_eq!(result.status, VerificationStatus::TamperDetected);
    assert!(matches!(
        result.require_verified(),
        Err(VerifyError::SignatureMismatch { .. })
    ));
}

#[test]
fn body_that_no_longer_parses_is_tamper() {
    let v = verifier();
    let text = v.sign_frame_at(&fact(), "alice", T0).unwrap().to_text();
    let tampered = text.replace("OBJECT=blue", "object=blue");
    assert_eq!(
        v.verify_frame(&tampered).unwrap().status,
        VerificationStatus::TamperDetected
    );
}

#[test]
fn timestamp_edit_is_tamper() {
    let v = verifier();
    let text = v.sign_frame_at(&fact(), "alice", T0).unwrap().to_text();
    let tampered = text.replace("|1700000000000]", "|1700000000001]");
    assert_eq!(
        v.verify_frame(&tampered).unwrap().status,
        VerificationStatus::TamperDetected
    );
}

#[test]
fn swapped_signer_is_tamper_and_unknown_signer_is_reported() {
    let v = verifier();
    let text = v.sign_frame_at(&fact(), "alice", T0).unwrap().to_text();
    let as_bob = text.replace("|alice|", "|bob|");
    assert_eq!(
        v.verify_frame(&as_bob).unwrap().status,
        VerificationStatus::TamperDetected
    );
    let as_mallory = text.replace("|alice|", "|mallory|");
    let result = v.verify_frame(&as_mallory).unwrap();
    assert_eq!(result.status, VerificationStatus::UnknownSigner);
    assert!(matches!(
        result.require_verified(),
        Err(VerifyError::UnknownSigner(id)) if id == "mallory"
    ));
}

#[test]
fn unsigned_and_unknown_signing_key_are_errors() {
    let v = verifier();
    assert!(matches!(
        v.verify_frame(&frame::to_canonical_text(&fact())),
        Err(VerifyError::Unsigned)
    ));
    assert!(matches!(
        v.sign_frame(&fact(), "mallory"),
        Err(VerifyError::UnknownSigner(_))
    ));
}

#[test]
fn accept_returns_the_parsed_frame() {
    let v = verifier();
    let signed = v.sign_frame_at(&fact(), "bob", T0).unwrap();
    let accepted = v.accept(&signed.to_text()).unwrap();
    assert_eq!(accepted, signed);
    assert_eq!(accepted.frame.get("SUBJECT"), Some("sky"));
    assert!(v.verify_signed(&accepted).unwrap().is_verified());
}

fn build_chain(v: &FrameVerifier, n: u64) -> Vec<String> {
    let mut prev: Option<SignedFrame> = None;
    let mut texts = Vec::new();
    for i in 0..n {
        let mut frame = Frame::builder("LOG")
            .header("LEVEL", "INFO")
            .header("SOURCE", "test")
            .token(NumericValue::Unsigned(i))
            .build()
            .unwrap();
        link(&mut frame, prev.as_ref()).unwrap();
        let signed = v.sign_frame_at(&frame, "alice", T0 + i).unwrap();
        texts.push(signed.to_text());
        prev = Some(signed);
    }
    texts
}

#[test]
fn intact_chain_verifies() {
    let v = verifier();
    let chain = build_chain(&v, 4);
    let verified = v.verify_chain(&chain).unwrap();
    assert_eq!(verified.len(), 4);
    assert_eq!(
        verified.first().unwrap().frame.get(PREV_ENTRY_HASH),
        Some(Digest::GENESIS.to_hex().as_str())
    );
    assert_eq!(
        verified.get(1).unwrap().frame.get(PREV_ENTRY_HASH),
        Some(sha256(chain.first().unwrap().as_bytes()).to_hex().as_str())
    );
}

#[test]
fn removed_entry_breaks_chain_at_its_position() {
    let v = verifier();
    let mut chain = build_chain(&v, 4);
    chain.remove(2);
    assert!(matches!(
        v.verify_chain(&chain),
        Err(ChainError::Broken { index: 2, .. })
    ));
}

#[test]
fn reordered_entries_break_chain() {
    let v = verifier();
    let mut chain = build_chain(&v, 3);
    chain.swap(0, 1);
    assert!(matches!(
        v.verify_chain(&chain),
        Err(ChainError::Broken { index: 0, .. })
    ));
}

#[test]
fn tampered_entry_fails_chain_with_its_index() {
    let v = verifier();
    let mut chain = build_chain(&v, 3);
    chain[1] = chain[1].replace("SOURCE=test", "SOURCE=evil");
    assert!(matches!(
        v.verify_chain(&chain),
        Err(ChainError::Entry { index: 1, .. })
    ));
}

fn word_frame() -> impl Strategy<Value = Frame> {
    (
        proptest::collection::btree_map("[A-Z]{1,4}", "[a-z0-9]{1,6}", 1..4),
        proptest::collection::vec("[a-z]{1,6}", 1..6),
    )
        .prop_map(|(header, words)| {
            let mut frame = Frame::default();
            for (k, v) in header {
                frame.set_header(&k, &v).unwrap();
            }
            for w in words {
                frame.push(Token::Word(w));
            }
            frame
        })
}

fn flip(c: char) -> char {
    match c {
        'z' => 'a',
        'Z' => 'A',
        '9' => '0',
        other => char::from_u32(u32::from(other) + 1).unwrap_or(other),
    }
}

proptest! {
    #[test]
    fn prop_any_alphanumeric_flip_in_body_is_detected(frame in word_frame(), pick in any::<prop::sample::Index>()) {
        let v = verifier();
        let text = v.sign_frame_at(&frame, "alice", T0).unwrap().to_text();
        let block_start = text.find("[SIG|").unwrap();
        let candidates: Vec<usize> = text[..block_start]
            .char_indices()
            .filter(|(_, c)| c.is_ascii_alphanumeric())
            .map(|(i, _)| i)
            .collect();
        let at = candidates[pick.index(candidates.len())];
        let original = text[at..].chars().next().unwrap();
        let mut tampered = String::with_capacity(text.len());
        tampered.push_str(&text[..at]);
        tampered.push(flip(original));
        tampered.push_str(&text[at + original.len_utf8()..]);
        let result = v.verify_frame(&tampered).unwrap();
        prop_assert_eq!(result.status, VerificationStatus::TamperDetected);
    }
}
