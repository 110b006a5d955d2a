//! Request signature generation and verification.
//!
//! A request is authorized when its parameters carry an HMAC signature
//! derived from a shared secret. The signature covers every parameter except
//! its own carrier (`sig`), serialized in sorted url-encoded form so that
//! signer and verifier agree on byte order regardless of transport.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Parameter name carrying the signature value.
pub const SIGNATURE_PARAM: &str = "sig";

/// Serialize parameters in sorted url-encoded form.
///
/// `BTreeMap` iteration order gives the sorted guarantee; the same
/// serialization feeds both signing and request-key derivation.
pub fn serialize_params(params: &BTreeMap<String, String>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

/// Derive the signature for a parameter map.
///
/// The `sig` parameter itself is excluded from the signed material.
pub fn sign(secret: &str, params: &BTreeMap<String, String>) -> String {
    let signed: BTreeMap<String, String> = params
        .iter()
        .filter(|(name, _)| name.as_str() != SIGNATURE_PARAM)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(serialize_params(&signed).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify that a parameter map was authorized by the secret holder.
///
/// An empty secret disables verification entirely and always returns `true`;
/// callers relying on authentication must ensure a secret is configured.
/// A missing or mismatched `sig` parameter returns `false`.
pub fn verify(secret: &str, params: &BTreeMap<String, String>) -> bool {
    if secret.is_empty() {
        return true;
    }

    let Some(carried) = params.get(SIGNATURE_PARAM) else {
        return false;
    };

    let expected = sign(secret, params);
    expected.as_bytes().ct_eq(carried.as_bytes()).into()
}
