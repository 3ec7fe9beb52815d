//! Salted claim commitments in SD-JWT disclosure format.
//!
//! A disclosure is `base64url(JSON([salt, claim_name, claim_value]))` and its
//! digest is `base64url(SHA-256(encoded))`. The encoded string is the one
//! byte-exact wire contract exchanged with verifiers: exactly three array
//! elements, compact JSON, no padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{CredError, CredErrorDetail, CredResult};

/// One salted claim commitment.
///
/// `encoded` is empty until [`encode_disclosure`] runs; after that it is the
/// canonical form and the digest is derived from it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disclosure {
    pub salt: String,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoded: String,
}

impl Disclosure {
    /// A not-yet-encoded disclosure. The salt is generated on first encode.
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            salt: String::new(),
            key: key.into(),
            value,
            encoded: String::new(),
        }
    }

    /// A disclosure with a caller-chosen salt (replay or test vectors).
    pub fn with_salt(
        salt: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            salt: salt.into(),
            key: key.into(),
            value,
            encoded: String::new(),
        }
    }

    pub fn is_encoded(&self) -> bool {
        !self.encoded.is_empty()
    }

    /// Digest of the encoded form, or `None` if not yet encoded.
    pub fn digest(&self) -> Option<String> {
        if self.is_encoded() {
            Some(compute_disclosure_digest(&self.encoded))
        } else {
            None
        }
    }
}

/// 16 random bytes, base64url without padding.
pub fn generate_salt() -> CredResult<String> {
    Ok(vitae_core::generate_salt()?)
}

/// Encode a disclosure in place and return the encoded string.
///
/// An empty salt is filled first; an existing salt is reused, so encoding the
/// same disclosure twice yields the same string.
pub fn encode_disclosure(disclosure: &mut Disclosure) -> CredResult<String> {
    if disclosure.salt.is_empty() {
        disclosure.salt = generate_salt()?;
    }

    let triple = (&disclosure.salt, &disclosure.key, &disclosure.value);
    let json = serde_json::to_string(&triple).map_err(|_| {
        CredErrorDetail::new(CredError::EncodingFailed, "failed to serialize disclosure")
    })?;

    disclosure.encoded = URL_SAFE_NO_PAD.encode(json.as_bytes());
    Ok(disclosure.encoded.clone())
}

/// Decode an encoded disclosure string.
///
/// Fails on invalid base64url, invalid JSON, an array whose length is not 3,
/// or a salt/claim name that is not a string.
pub fn decode_disclosure(encoded: &str) -> CredResult<Disclosure> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| {
        CredErrorDetail::new(
            CredError::DecodingFailed("invalid base64url".into()),
            "disclosure is not valid base64url",
        )
    })?;

    let parsed: serde_json::Value = serde_json::from_slice(&bytes).map_err(|_| {
        CredErrorDetail::new(
            CredError::DecodingFailed("invalid json".into()),
            "disclosure payload is not valid JSON",
        )
    })?;

    let mut items = match parsed {
        serde_json::Value::Array(items) => items,
        _ => {
            return Err(CredErrorDetail::new(
                CredError::DecodingFailed("not an array".into()),
                "disclosure payload must be a JSON array",
            ))
        }
    };

    if items.len() != 3 {
        return Err(CredErrorDetail::new(
            CredError::DecodingFailed(format!("array length {}", items.len())),
            "disclosure array must have exactly 3 elements",
        ));
    }

    let value = items.pop().unwrap_or(serde_json::Value::Null);
    let key = match items.pop() {
        Some(serde_json::Value::String(s)) => s,
        _ => {
            return Err(CredErrorDetail::new(
                CredError::DecodingFailed("claim name not a string".into()),
                "disclosure claim name must be a string",
            ))
        }
    };
    let salt = match items.pop() {
        Some(serde_json::Value::String(s)) => s,
        _ => {
            return Err(CredErrorDetail::new(
                CredError::DecodingFailed("salt not a string".into()),
                "disclosure salt must be a string",
            ))
        }
    };

    Ok(Disclosure {
        salt,
        key,
        value,
        encoded: encoded.to_string(),
    })
}

/// `base64url(SHA-256(encoded))`. Pure: depends on nothing but `encoded`.
pub fn compute_disclosure_digest(encoded: &str) -> String {
    vitae_core::sha256_b64url(encoded.as_bytes())
}

/// Recompute the digest of `encoded` and compare it with `expected_digest`.
pub fn verify_disclosure(encoded: &str, expected_digest: &str) -> bool {
    let actual = compute_disclosure_digest(encoded);
    actual.as_bytes().ct_eq(expected_digest.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encode_generates_salt() {
        let mut d = Disclosure::new("marker", json!("718-7"));
        assert!(d.salt.is_empty());
        let encoded = encode_disclosure(&mut d).unwrap();
        assert_eq!(d.salt.len(), 22);
        assert_eq!(d.encoded, encoded);
    }

    #[test]
    fn test_encode_is_idempotent_for_fixed_salt() {
        let mut d = Disclosure::new("rangeMin", json!(13.5));
        let first = encode_disclosure(&mut d).unwrap();
        let salt = d.salt.clone();
        let second = encode_disclosure(&mut d).unwrap();
        assert_eq!(first, second);
        assert_eq!(d.salt, salt);
    }

    #[test]
    fn test_wire_format_is_compact_triple() {
        let mut d =
            Disclosure::with_salt("_26bc4LT-ac6q2KI6cBW5es", "family_name", json!("Möbius"));
        let encoded = encode_disclosure(&mut d).unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            r#"["_26bc4LT-ac6q2KI6cBW5es","family_name","Möbius"]"#
        );
        assert!(!encoded.contains('='));
    }

    #[test]
    fn test_decode_roundtrip_structured_value() {
        let mut d = Disclosure::with_salt("salt", "window", json!({"months": 6, "ok": true}));
        let encoded = encode_disclosure(&mut d).unwrap();
        let decoded = decode_disclosure(&encoded).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_disclosure("not base64 !!").unwrap_err();
        assert!(matches!(err.kind, CredError::DecodingFailed(_)));
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        let encoded = URL_SAFE_NO_PAD.encode(b"[\"a\",");
        let err = decode_disclosure(&encoded).unwrap_err();
        assert!(matches!(err.kind, CredError::DecodingFailed(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        for payload in [r#"["a","b"]"#, r#"["a","b","c","d"]"#, r#"{"a":1}"#] {
            let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
            let err = decode_disclosure(&encoded).unwrap_err();
            assert!(matches!(err.kind, CredError::DecodingFailed(_)), "{}", payload);
        }
    }

    #[test]
    fn test_decode_rejects_non_string_salt_or_key() {
        for payload in [r#"[1,"b","c"]"#, r#"["a",2,"c"]"#] {
            let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
            assert!(decode_disclosure(&encoded).is_err(), "{}", payload);
        }
    }

    #[test]
    fn test_digest_matches_manual_sha256() {
        let encoded = "WyJzYWx0IiwibWFya2VyIiwiNzE4LTciXQ";
        assert_eq!(
            compute_disclosure_digest(encoded),
            vitae_core::sha256_b64url(encoded.as_bytes())
        );
    }

    #[test]
    fn test_verify_disclosure() {
        let mut d = Disclosure::new("marker", json!("718-7"));
        let encoded = encode_disclosure(&mut d).unwrap();
        let digest = compute_disclosure_digest(&encoded);
        assert!(verify_disclosure(&encoded, &digest));
        assert!(!verify_disclosure(&encoded, "AAAA"));
        assert!(!verify_disclosure(&format!("{}x", encoded), &digest));
    }

    #[test]
    fn test_digest_accessor() {
        let mut d = Disclosure::new("k", json!(1));
        assert!(d.digest().is_none());
        let encoded = encode_disclosure(&mut d).unwrap();
        assert_eq!(d.digest().unwrap(), compute_disclosure_digest(&encoded));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_key_and_value(
            key in "\\PC{0,24}",
            n in any::<i64>(),
            s in "\\PC{0,32}",
            b in any::<bool>()
        ) {
            let value = json!({ "n": n, "s": s, "b": b });
            let mut d = Disclosure::new(key.clone(), value.clone());
            let encoded = encode_disclosure(&mut d).unwrap();
            let decoded = decode_disclosure(&encoded).unwrap();
            prop_assert_eq!(decoded.key, key);
            prop_assert_eq!(decoded.value, value);
            prop_assert_eq!(decoded.salt, d.salt);
        }

        #[test]
        fn prop_digest_is_deterministic(s in "\\PC{0,64}") {
            prop_assert_eq!(compute_disclosure_digest(&s), compute_disclosure_digest(&s));
            prop_assert!(verify_disclosure(&s, &compute_disclosure_digest(&s)));
        }
    }
}
