//! # Admission Proof
//!
//! The single, authoritative implementation of the client proof checked by
//! the Admission Validator. Centralized here so the validator and any
//! client-side signer use the SAME code.
//!
//! ## Scheme
//!
//! `proof = hex(HMAC-SHA256(shared_secret, user_id || 0x00 || kind || 0x00 || magnitude_le))`
//!
//! The shared secret is deployment configuration; it never travels on the
//! wire. Verification is constant-time via the `hmac` crate's
//! `verify_slice`.

use crate::entities::{ActionKind, Score, UserId};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 output.
pub type ActionProof = String;

/// Canonical byte encoding of the proved fields.
///
/// Field separators prevent ambiguity between e.g. ("ab", "c") and ("a", "bc").
fn proof_input(user_id: &UserId, kind: &ActionKind, magnitude: Score) -> Vec<u8> {
    let mut input = Vec::with_capacity(user_id.as_str().len() + kind.as_str().len() + 10);
    input.extend_from_slice(user_id.as_str().as_bytes());
    input.push(0);
    input.extend_from_slice(kind.as_str().as_bytes());
    input.push(0);
    input.extend_from_slice(&magnitude.to_le_bytes());
    input
}

/// Computes the proof a well-behaved client supplies with a delta.
#[must_use]
pub fn compute_action_proof(
    user_id: &UserId,
    kind: &ActionKind,
    magnitude: Score,
    shared_secret: &[u8],
) -> ActionProof {
    let mut mac =
        HmacSha256::new_from_slice(shared_secret).expect("HMAC can take key of any size");
    mac.update(&proof_input(user_id, kind, magnitude));
    hex_encode(&mac.finalize().into_bytes())
}

/// Verifies a supplied proof against the recomputed value.
///
/// # Security
///
/// Constant-time comparison; a malformed (non-hex) proof fails closed.
#[must_use]
pub fn verify_action_proof(
    user_id: &UserId,
    kind: &ActionKind,
    magnitude: Score,
    shared_secret: &[u8],
    supplied: &str,
) -> bool {
    let Some(supplied_bytes) = hex_decode(supplied) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(shared_secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(&proof_input(user_id, kind, magnitude));
    mac.verify_slice(&supplied_bytes).is_ok()
}

/// Lowercase hex encoding.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Hex decoding; `None` on odd length or non-hex characters.
#[must_use]
pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
