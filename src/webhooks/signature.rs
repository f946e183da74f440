//! `X-Hub-Signature-256` verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body using the
//! webhook secret, and sends `sha256=<hex>` in the header. Deliveries are
//! verified before their body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header is not of the form sha256=<hex>")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,

    #[error("webhook secret is not usable as an HMAC key")]
    InvalidKey,
}

/// Decodes `sha256=<hex>` into the raw digest bytes.
pub fn parse_signature_header(header: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or(SignatureError::Malformed)?;
    hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)
}

fn mac_for(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)
}

/// Produces the header value GitHub would send for `payload`.
pub fn sign(payload: &[u8], secret: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Checks `header` against `payload` in constant time.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let expected = parse_signature_header(header)?;
    let mut mac = mac_for(secret)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        // From GitHub's webhook documentation.
        let header = "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert_eq!(
            verify_signature(b"Hello, World!", header, b"It's a Secret to Everybody"),
            Ok(())
        );
        assert_eq!(
            sign(b"Hello, World!", b"It's a Secret to Everybody").unwrap(),
            header
        );
    }

    #[test]
    fn malformed_headers() {
        assert_eq!(parse_signature_header("abcd"), Err(SignatureError::Malformed));
        assert_eq!(parse_signature_header("sha1=abcd"), Err(SignatureError::Malformed));
        assert_eq!(parse_signature_header("sha256=xyz"), Err(SignatureError::Malformed));
        assert_eq!(parse_signature_header("sha256=12ab"), Ok(vec![0x12, 0xab]));
    }

    #[test]
    fn truncated_digest_is_rejected() {
        let header = sign(b"payload", b"secret").unwrap();
        let truncated = &header[..header.len() - 2];
        assert_eq!(
            verify_signature(b"payload", truncated, b"secret"),
            Err(SignatureError::Mismatch)
        );
    }

    proptest! {
        #[test]
        fn signed_payloads_verify(
            payload in prop::collection::vec(any::<u8>(), 0..512),
            secret in prop::collection::vec(any::<u8>(), 1..64),
        ) {
            let header = sign(&payload, &secret).unwrap();
            prop_assert_eq!(verify_signature(&payload, &header, &secret), Ok(()));
        }

        #[test]
        fn tampered_payloads_fail(
            payload in prop::collection::vec(any::<u8>(), 1..512),
            flip in any::<prop::sample::Index>(),
        ) {
            let header = sign(&payload, b"secret").unwrap();
            let mut tampered = payload.clone();
            let i = flip.index(tampered.len());
            tampered[i] ^= 0x01;
            prop_assert_eq!(
                verify_signature(&tampered, &header, b"secret"),
                Err(SignatureError::Mismatch)
            );
        }

        #[test]
        fn wrong_secret_fails(payload in prop::collection::vec(any::<u8>(), 0..128)) {
            let header = sign(&payload, b"right").unwrap();
            prop_assert_eq!(
                verify_signature(&payload, &header, b"wrong"),
                Err(SignatureError::Mismatch)
            );
        }
    }
}
