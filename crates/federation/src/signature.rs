//! HTTP Signature implementation for `ActivityPub`.
//!
//! Implements draft-cavage-http-signatures for signing and verifying
//! federation requests. GETs sign `(request-target) host date`; requests
//! with a body additionally sign `digest` (SHA-256 of the body) and
//! `content-length`.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use pkcs8::DecodePrivateKey;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{SigningKey, VerifyingKey},
    pkcs8::DecodePublicKey,
};
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// HTTP Signature error.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Private key PEM did not parse.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    /// Public key PEM did not parse.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    /// RSA signing failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    /// Signature bytes rejected.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
    /// A signed header is absent from the request.
    #[error("Missing header: {0}")]
    MissingHeader(String),
    /// The `Signature` header is not well-formed.
    #[error("Invalid signature header")]
    InvalidSignatureHeader,
    /// The request URL has no host.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// HTTP Signature signer for outgoing requests.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl HttpSigner {
    /// Create a signer from a PEM-encoded private key.
    pub fn new(private_key_pem: &str, key_id: String) -> Result<Self, SignatureError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignatureError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            private_key,
            key_id,
        })
    }

    /// The key id advertised in signed requests.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request, returning every header to attach.
    ///
    /// Covers `(request-target) host date` always, plus `digest` and
    /// `content-length` when a body is present.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = url
            .host_str()
            .ok_or_else(|| SignatureError::InvalidUrl("No host in URL".to_string()))?;
        let path = url.path();
        let query = url.query().map_or(String::new(), |q| format!("?{q}"));
        let request_target = format!("{} {path}{query}", method.to_lowercase());

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let digest = body.map(|b| {
            let hash = Sha256::digest(b);
            format!("SHA-256={}", BASE64.encode(hash))
        });
        let content_length = body.map(|b| b.len().to_string());

        let mut signed_headers = vec!["(request-target)", "host", "date"];
        if body.is_some() {
            signed_headers.push("digest");
            signed_headers.push("content-length");
        }

        let mut signing_parts = Vec::new();
        for header in &signed_headers {
            let value = match *header {
                "(request-target)" => request_target.clone(),
                "host" => host.to_string(),
                "date" => date.clone(),
                "digest" => digest.clone().unwrap_or_default(),
                "content-length" => content_length.clone().unwrap_or_default(),
                _ => String::new(),
            };
            signing_parts.push(format!("{header}: {value}"));
        }
        let signing_string = signing_parts.join("\n");

        debug!(signing_string = %signing_string, "Signing string");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature_bytes = signing_key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        let signature = BASE64.encode(signature_bytes.to_bytes());

        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            signed_headers.join(" "),
            signature
        );

        let mut headers = HeaderMap::new();
        let put = |headers: &mut HeaderMap, name: &'static str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| SignatureError::SigningFailed(e.to_string()))
                .map(|v| headers.insert(HeaderName::from_static(name), v))
        };
        put(&mut headers, "host", host)?;
        put(&mut headers, "date", &date)?;
        if let Some(ref d) = digest {
            put(&mut headers, "digest", d)?;
        }
        if let Some(ref len) = content_length {
            put(&mut headers, "content-length", len)?;
        }
        put(&mut headers, "signature", &signature_header)?;

        Ok(headers)
    }
}

/// HTTP Signature verifier for incoming requests.
pub struct HttpVerifier;

impl HttpVerifier {
    /// Parse the `Signature` header into components.
    pub fn parse_signature_header(header: &str) -> Result<SignatureComponents, SignatureError> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers_list = None;
        let mut signature = None;

        for part in header.split(',') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                let value = value.trim_matches('"');
                match key {
                    "keyId" => key_id = Some(value.to_string()),
                    "algorithm" => algorithm = Some(value.to_string()),
                    "headers" => headers_list = Some(value.to_string()),
                    "signature" => signature = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        Ok(SignatureComponents {
            key_id: key_id.ok_or(SignatureError::InvalidSignatureHeader)?,
            algorithm: algorithm.unwrap_or_else(|| "rsa-sha256".to_string()),
            headers: headers_list
                .unwrap_or_else(|| "date".to_string())
                .split(' ')
                .map(String::from)
                .collect(),
            signature: signature.ok_or(SignatureError::InvalidSignatureHeader)?,
        })
    }

    /// Verify an HTTP signature using the given public key.
    pub fn verify(
        public_key_pem: &str,
        components: &SignatureComponents,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
    ) -> Result<bool, SignatureError> {
        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;

        let mut signing_parts = Vec::new();
        for header in &components.headers {
            let value = match header.as_str() {
                "(request-target)" => format!("{} {path}", method.to_lowercase()),
                h => headers
                    .get(h)
                    .ok_or_else(|| SignatureError::MissingHeader(h.to_string()))?
                    .clone(),
            };
            signing_parts.push(format!("{header}: {value}"));
        }
        let signing_string = signing_parts.join("\n");

        debug!(signing_string = %signing_string, "Verifying signing string");

        let signature_bytes = BASE64
            .decode(&components.signature)
            .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;

        let verifying_key = VerifyingKey::<Sha256>::new(public_key);
        let signature = rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice())
            .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;

        match verifying_key.verify(signing_string.as_bytes(), &signature) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "Signature verification failed");
                Ok(false)
            }
        }
    }
}

/// Parsed signature header components.
#[derive(Debug, Clone)]
pub struct SignatureComponents {
    /// `keyId` parameter — the signer's public key resource.
    pub key_id: String,
    /// Signature algorithm, `rsa-sha256` by default.
    pub algorithm: String,
    /// Headers covered by the signature, in order.
    pub headers: Vec<String>,
    /// Base64 signature bytes.
    pub signature: String,
}

/// Calculate the `SHA-256=` digest of a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("SHA-256={}", BASE64.encode(hash))
}

/// Verify that a digest header matches the body.
#[must_use]
pub fn verify_digest(body: &[u8], digest_header: &str) -> bool {
    calculate_digest(body) == digest_header
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn generate_test_keypair() -> (String, String) {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = public_key.to_public_key_pem(LineEnding::LF).unwrap();

        (private_pem.to_string(), public_pem)
    }

    #[test]
    fn test_sign_and_verify_post() {
        let (private_pem, public_pem) = generate_test_keypair();

        let signer = HttpSigner::new(
            &private_pem,
            "https://a.example/users/alice#main-key".to_string(),
        )
        .unwrap();

        let url = Url::parse("https://remote.example/inbox").unwrap();
        let body = br#"{"type":"Create"}"#;

        let headers = signer.sign_request("POST", &url, Some(body)).unwrap();

        let sig_header = headers.get("signature").unwrap().to_str().unwrap();
        let components = HttpVerifier::parse_signature_header(sig_header).unwrap();
        assert!(components.headers.iter().any(|h| h == "digest"));
        assert!(components.headers.iter().any(|h| h == "content-length"));

        let mut verify_headers = HashMap::new();
        for name in ["host", "date", "digest", "content-length"] {
            verify_headers.insert(
                name.to_string(),
                headers.get(name).unwrap().to_str().unwrap().to_string(),
            );
        }

        let result =
            HttpVerifier::verify(&public_pem, &components, "POST", "/inbox", &verify_headers)
                .unwrap();
        assert!(result);
    }

    #[test]
    fn test_get_signature_covers_no_digest() {
        let (private_pem, _) = generate_test_keypair();
        let signer = HttpSigner::new(
            &private_pem,
            "https://a.example/users/alice#main-key".to_string(),
        )
        .unwrap();

        let url = Url::parse("https://remote.example/users/bob").unwrap();
        let headers = signer.sign_request("GET", &url, None).unwrap();

        assert!(headers.get("digest").is_none());
        let sig_header = headers.get("signature").unwrap().to_str().unwrap();
        let components = HttpVerifier::parse_signature_header(sig_header).unwrap();
        assert_eq!(components.headers, vec!["(request-target)", "host", "date"]);
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let (private_pem, public_pem) = generate_test_keypair();
        let signer = HttpSigner::new(
            &private_pem,
            "https://a.example/users/alice#main-key".to_string(),
        )
        .unwrap();

        let url = Url::parse("https://remote.example/inbox").unwrap();
        let headers = signer.sign_request("POST", &url, Some(b"original")).unwrap();

        let sig_header = headers.get("signature").unwrap().to_str().unwrap();
        let components = HttpVerifier::parse_signature_header(sig_header).unwrap();

        let mut verify_headers = HashMap::new();
        for name in ["host", "date", "content-length"] {
            verify_headers.insert(
                name.to_string(),
                headers.get(name).unwrap().to_str().unwrap().to_string(),
            );
        }
        // Tampering replaces the digest the signature covered.
        verify_headers.insert("digest".to_string(), calculate_digest(b"tampered"));

        let result =
            HttpVerifier::verify(&public_pem, &components, "POST", "/inbox", &verify_headers)
                .unwrap();
        assert!(!result);
    }

    #[test]
    fn test_parse_signature_header() {
        let header = r#"keyId="https://a.example/users/alice#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="abc123==""#;

        let components = HttpVerifier::parse_signature_header(header).unwrap();

        assert_eq!(components.key_id, "https://a.example/users/alice#main-key");
        assert_eq!(components.algorithm, "rsa-sha256");
        assert_eq!(
            components.headers,
            vec!["(request-target)", "host", "date", "digest"]
        );
        assert_eq!(components.signature, "abc123==");
    }

    #[test]
    fn test_digest_roundtrip() {
        let body = b"hello world";
        let digest = calculate_digest(body);
        assert!(digest.starts_with("SHA-256="));
        assert!(verify_digest(body, &digest));
        assert!(!verify_digest(b"wrong body", &digest));
    }
}
