//! AWS Signature Version 4 request signing.
//!
//! Covers exactly what the transcoder control-plane calls need: POST/GET
//! with a JSON body, no query string, headers `content-type`, `host`,
//! and `x-amz-date`. Written against the published SigV4 canonical
//! request format.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-date";

/// Static signing credentials
#[derive(Debug, Clone)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Headers to attach to the outgoing request
#[derive(Debug)]
pub struct SignedRequest {
    /// Value for the `x-amz-date` header
    pub amz_date: String,
    /// Value for the `Authorization` header
    pub authorization: String,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any length is accepted");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Sign a request with no query string against the given region/service.
///
/// `path` must already be the canonical URI (absolute, normalized). The
/// transcoder endpoints only use paths that need no percent-encoding.
#[allow(clippy::too_many_arguments)]
pub fn sign_request(
    method: &str,
    host: &str,
    path: &str,
    content_type: &str,
    payload: &[u8],
    region: &str,
    service: &str,
    credentials: &SigningCredentials,
    now: DateTime<Utc>,
) -> SignedRequest {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let payload_hash = sha256_hex(payload);

    let canonical_headers = format!(
        "content-type:{}\nhost:{}\nx-amz-date:{}\n",
        content_type.trim(),
        host.trim(),
        amz_date
    );

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, path, canonical_headers, SIGNED_HEADERS, payload_hash
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    // Key derivation: HMAC chain over date, region, service
    let k_secret = format!("AWS4{}", credentials.secret_access_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");

    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, credential_scope, SIGNED_HEADERS, signature
    );

    SignedRequest {
        amz_date,
        authorization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> SigningCredentials {
        SigningCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".into(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 30, 45).unwrap()
    }

    #[test]
    fn empty_payload_hashes_to_known_constant() {
        // SHA-256 of the empty string, straight from the SigV4 docs
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn amz_date_uses_basic_iso_format() {
        let signed = sign_request(
            "GET",
            "example.mediaconvert.us-east-1.amazonaws.com",
            "/2017-08-29/endpoints",
            "application/json",
            b"",
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );
        assert_eq!(signed.amz_date, "20260315T123045Z");
    }

    #[test]
    fn authorization_header_shape() {
        let signed = sign_request(
            "POST",
            "example.mediaconvert.us-east-1.amazonaws.com",
            "/2017-08-29/jobs",
            "application/json",
            br#"{"role":"arn:aws:iam::123456789012:role/transcode"}"#,
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );

        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260315/us-east-1/mediaconvert/aws4_request, "
        ));
        assert!(signed
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date"));

        let signature = signed
            .authorization
            .rsplit("Signature=")
            .next()
            .unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signing_is_deterministic() {
        let a = sign_request(
            "POST",
            "host.example.com",
            "/2017-08-29/jobs",
            "application/json",
            b"{}",
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );
        let b = sign_request(
            "POST",
            "host.example.com",
            "/2017-08-29/jobs",
            "application/json",
            b"{}",
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );
        assert_eq!(a.authorization, b.authorization);
    }

    #[test]
    fn signature_depends_on_payload_and_date() {
        let base = sign_request(
            "POST",
            "host.example.com",
            "/2017-08-29/jobs",
            "application/json",
            b"{}",
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );
        let other_payload = sign_request(
            "POST",
            "host.example.com",
            "/2017-08-29/jobs",
            "application/json",
            b"{\"a\":1}",
            "us-east-1",
            "mediaconvert",
            &creds(),
            fixed_time(),
        );
        let other_date = sign_request(
            "POST",
            "host.example.com",
            "/2017-08-29/jobs",
            "application/json",
            b"{}",
            "us-east-1",
            "mediaconvert",
            &creds(),
            Utc.with_ymd_and_hms(2026, 3, 16, 12, 30, 45).unwrap(),
        );

        assert_ne!(base.authorization, other_payload.authorization);
        assert_ne!(base.authorization, other_date.authorization);
    }
}
