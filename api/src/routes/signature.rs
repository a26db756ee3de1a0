//! Webhook signature verification.
//!
//! The sender signs the raw request body with HMAC-SHA256 and puts
//! `sha256=<hex>` into `X-Hub-Signature-256`. Comparison goes through
//! `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Checks `signature` (the raw header value) against the body. Missing
/// header, bad prefix, bad hex and a wrong digest all fail the same way.
pub fn verify(secret: &str, signature: Option<&str>, body: &[u8]) -> bool {
    let Some(digest) = signature
        .and_then(|s| s.strip_prefix("sha256="))
        .and_then(|s| hex::decode(s).ok())
    else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}

/// Produces the header value for a body, for tests and local tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // new_from_slice only fails for unusable key lengths, which HMAC does
    // not have.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret";
    const BODY: &[u8] = br#"{"eventKey":"pr:opened"}"#;

    #[test]
    fn signing_and_verifying_are_deterministic() {
        let sig = sign(SECRET, BODY);
        assert_eq!(sig, sign(SECRET, BODY));
        assert!(verify(SECRET, Some(&sig), BODY));
    }

    #[test]
    fn one_flipped_byte_fails_verification() {
        let sig = sign(SECRET, BODY);
        let mut tampered = BODY.to_vec();
        tampered.push(b' ');
        assert!(!verify(SECRET, Some(&sig), &tampered));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let sig = sign("other-secret", BODY);
        assert!(!verify(SECRET, Some(&sig), BODY));
    }

    #[test]
    fn missing_or_malformed_headers_fail_closed() {
        assert!(!verify(SECRET, None, BODY));
        assert!(!verify(SECRET, Some(""), BODY));
        assert!(!verify(SECRET, Some("md5=abcdef"), BODY));
        assert!(!verify(SECRET, Some("sha256=zzzz"), BODY));
    }
}
