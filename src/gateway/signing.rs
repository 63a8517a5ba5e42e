//! X-VERIFY signing for the UPI processor wire contract.
//!
//! The processor authenticates requests with a salted SHA-256 scheme:
//! - For payment creation, the signature covers `base64(payload) + path + salt_key`
//! - For status checks, it covers `/pg/v1/status/{merchantId}/{txnId} + salt_key`
//! - The header value is `{lowercase-hex-sha256}###{salt_index}`
//!
//! The `###` delimiter and trailing salt index are part of the wire contract
//! and must be reproduced exactly.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize a payload to its canonical JSON form and base64-encode it.
///
/// The canonical byte representation is fixed by the payload struct's field
/// declaration order, so the same struct always encodes to the same bytes.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(payload)?;
    Ok(BASE64_STANDARD.encode(json))
}

/// Compute an X-VERIFY header value over already-concatenated signed content.
///
/// The salt key is appended to the content before hashing; the salt index is
/// carried in cleartext after the `###` delimiter so the processor knows which
/// key to verify against.
pub fn x_verify(signed_content: &str, salt_key: &str, salt_index: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signed_content.as_bytes());
    hasher.update(salt_key.as_bytes());
    let digest = hasher.finalize();
    format!("{}###{}", hex::encode(digest), salt_index)
}

/// Sign a base64-encoded payment payload for the given endpoint path.
pub fn sign_payload(base64_payload: &str, endpoint_path: &str, salt_key: &str, salt_index: u8) -> String {
    x_verify(&format!("{base64_payload}{endpoint_path}"), salt_key, salt_index)
}

/// Sign a status-check path (`/pg/v1/status/{merchantId}/{txnId}`).
///
/// Status checks have no body; the signed content is the path pattern itself.
pub fn sign_status_path(status_path: &str, salt_key: &str, salt_index: u8) -> String {
    x_verify(status_path, salt_key, salt_index)
}

/// Verify a presented X-VERIFY header against the expected signed content.
///
/// Recomputes the signature with the salt index carried in the header and
/// compares in constant time. Returns `false` for any malformed header.
pub fn verify_x_verify(header: &str, signed_content: &str, salt_key: &str) -> bool {
    let Some((_, index)) = header.split_once("###") else {
        return false;
    };
    let Ok(salt_index) = index.parse::<u8>() else {
        return false;
    };

    let expected = x_verify(signed_content, salt_key, salt_index);

    // Constant-time comparison to prevent timing attacks
    constant_time_eq(header.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let sig1 = sign_payload("eyJhIjoxfQ==", "/pg/v1/pay", "s3cret", 1);
        let sig2 = sign_payload("eyJhIjoxfQ==", "/pg/v1/pay", "s3cret", 1);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_known_vector() {
        // sha256(base64({"a":1}) + "/pg/v1/pay" + "s3cret") against an
        // independently computed reference digest
        let encoded = encode_payload(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(encoded, "eyJhIjoxfQ==");

        let sig = sign_payload(&encoded, "/pg/v1/pay", "s3cret", 1);
        assert_eq!(
            sig,
            "560ddcd218c8d21844f9f68b6513bc1472250d9f047e98f606ab857b7bc65c7f###1"
        );
    }

    #[test]
    fn test_status_path_known_vector() {
        let sig = sign_status_path("/pg/v1/status/MERCHANT123/MT1700000000000AB12CD34", "s3cret", 1);
        assert_eq!(
            sig,
            "52b1673303dc9c8fb2cceec094ed65e8640fff068d09956ec2f2f43c145b1038###1"
        );
    }

    #[test]
    fn test_tamper_sensitivity() {
        let base = sign_payload("eyJhIjoxfQ==", "/pg/v1/pay", "s3cret", 1);

        // Different payload
        assert_ne!(base, sign_payload("eyJhIjoyfQ==", "/pg/v1/pay", "s3cret", 1));
        // Different path
        assert_ne!(base, sign_payload("eyJhIjoxfQ==", "/pg/v1/pax", "s3cret", 1));
        // Different secret
        assert_ne!(base, sign_payload("eyJhIjoxfQ==", "/pg/v1/pay", "s3creT", 1));
    }

    #[test]
    fn test_signature_format() {
        let sig = sign_payload("cGF5bG9hZA==", "/pg/v1/pay", "key", 1);

        let (digest, index) = sig.split_once("###").expect("missing ### delimiter");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(index.chars().all(|c| c.is_ascii_digit()));
        assert!(!index.is_empty());
    }

    #[test]
    fn test_salt_index_carried_verbatim() {
        let sig = sign_payload("cGF5bG9hZA==", "/pg/v1/pay", "key", 2);
        assert!(sig.ends_with("###2"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let header = x_verify("content", "key", 1);
        assert!(verify_x_verify(&header, "content", "key"));

        // Wrong content should fail
        assert!(!verify_x_verify(&header, "other", "key"));
        // Wrong key should fail
        assert!(!verify_x_verify(&header, "content", "other"));
    }

    #[test]
    fn test_verify_malformed_header() {
        assert!(!verify_x_verify("not-a-signature", "content", "key"));
        assert!(!verify_x_verify("abc###notanumber", "content", "key"));
        assert!(!verify_x_verify("", "content", "key"));
    }
}
