//! HMAC-SHA256 webhook signature verification.
//!
//! `serde_json::Map` is a `BTreeMap` by default (no `preserve_order`
//! feature), so `serde_json::to_string` on a parsed payload already
//! produces a canonical, sorted-key, separator-free form suitable for
//! signing.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub fn canonical_body(payload: &Value) -> String {
    serde_json::to_string(payload).expect("json value always serializes")
}

pub fn expected_signature(payload: &Value, secret: &str) -> String {
    let body = canonical_body(payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body.as_bytes());
    let digest = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(digest))
}

pub fn verify_signature(payload: &Value, signature: &str, secret: &str) -> bool {
    let expected = expected_signature(payload, secret);
    if expected.len() != signature.len() {
        return false;
    }
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
