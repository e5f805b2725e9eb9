//! Inbound request verification.
//!
//! Authenticates an incoming federation request: parse the `Signature`
//! header, resolve `keyId` to the owning actor, fetch the actor's
//! public key through the TTL cache, and verify. On a first failure the
//! cached key is invalidated and fetched once more before giving up —
//! bounded retries that still tolerate legitimate key rotation.

use std::collections::HashMap;

use fediwire_common::{AppError, AppResult};
use fediwire_db::ObjectRepository;
use fediwire_vocab::TypedObject;
use tracing::{debug, warn};
use url::Url;

use crate::cache::KeyCache;
use crate::signature::{HttpVerifier, SignatureComponents, verify_digest};
use crate::transport::Transport;
use crate::webfinger::WebfingerClient;

/// Suffixes a `keyId` may append to the owner's actor IRI.
const KEY_SUFFIXES: &[&str] = &["/publickey", "/public_key", "/main-key"];

/// Where a `keyId` points after suffix stripping.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyOwner {
    /// A dereferenceable actor IRI.
    Iri(Url),
    /// An account handle that needs a `WebFinger` round trip.
    Acct(String),
}

/// The owner a `keyId` designates: fragment and known public-key
/// resource suffixes stripped, `acct:` handles passed through for
/// `WebFinger` resolution.
fn key_owner(key_id: &str) -> AppResult<KeyOwner> {
    let without_fragment = key_id.split('#').next().unwrap_or(key_id);
    let mut owner = without_fragment;
    for suffix in KEY_SUFFIXES {
        if let Some(stripped) = owner.strip_suffix(suffix) {
            owner = stripped;
            break;
        }
    }

    if let Some(handle) = owner.strip_prefix("acct:") {
        return Ok(KeyOwner::Acct(handle.to_string()));
    }
    let iri = Url::parse(owner)
        .map_err(|_| AppError::Signature(format!("keyId is not resolvable: {key_id}")))?;
    if iri.scheme() != "http" && iri.scheme() != "https" {
        return Err(AppError::Signature(format!(
            "keyId scheme is not dereferenceable: {key_id}"
        )));
    }
    Ok(KeyOwner::Iri(iri))
}

/// Verifier for incoming signed requests.
pub struct InboundVerifier<S> {
    transport: Transport<S>,
    webfinger: WebfingerClient,
    cache: KeyCache,
}

impl<S: ObjectRepository> InboundVerifier<S> {
    /// Create a verifier fetching keys over `transport`.
    #[must_use]
    pub fn new(transport: Transport<S>, webfinger: WebfingerClient, cache: KeyCache) -> Self {
        Self {
            transport,
            webfinger,
            cache,
        }
    }

    /// Verify a request's signature (and body digest, when present).
    ///
    /// Returns the authenticated actor's IRI.
    pub async fn verify_request(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> AppResult<Url> {
        let header = headers
            .get("signature")
            .ok_or_else(|| AppError::Signature("no Signature header".to_string()))?;
        let components = HttpVerifier::parse_signature_header(header)
            .map_err(|e| AppError::Signature(e.to_string()))?;

        if let (Some(body), Some(digest)) = (body, headers.get("digest")) {
            if !verify_digest(body, digest) {
                return Err(AppError::Signature("digest does not match body".to_string()));
            }
        }

        let actor_iri = self.resolve_owner(&components.key_id).await?;

        // First attempt goes through the cache; a failure invalidates
        // and refetches exactly once to pick up a rotated key.
        let pem = self.fetch_key(&actor_iri).await?;
        if self.check(&pem, &components, method, path, headers)? {
            return Ok(actor_iri);
        }

        warn!(actor = %actor_iri, "Signature failed, refetching key once");
        self.cache.invalidate(actor_iri.as_str());
        let pem = self.fetch_key(&actor_iri).await?;
        if self.check(&pem, &components, method, path, headers)? {
            return Ok(actor_iri);
        }

        Err(AppError::Signature(format!(
            "signature by {} did not verify",
            components.key_id
        )))
    }

    async fn resolve_owner(&self, key_id: &str) -> AppResult<Url> {
        match key_owner(key_id)? {
            KeyOwner::Iri(iri) => Ok(iri),
            KeyOwner::Acct(handle) => {
                debug!(handle = %handle, "Resolving key owner via WebFinger");
                self.webfinger.resolve(&handle).await
            }
        }
    }

    /// The actor's public key PEM, from cache or a fresh actor fetch.
    async fn fetch_key(&self, actor_iri: &Url) -> AppResult<String> {
        if let Some(cached) = self.cache.get(actor_iri.as_str()) {
            return Ok(cached.public_key_pem);
        }

        let document = self.transport.dereference(actor_iri).await?;
        let actor = TypedObject::decode(&document)
            .map_err(|e| AppError::Signature(format!("actor document undecodable: {e}")))?;
        let pem = actor
            .first_embedded("publicKey")
            .and_then(|key| key.first_str("publicKeyPem"))
            .ok_or_else(|| {
                AppError::Signature(format!("actor {actor_iri} advertises no public key"))
            })?
            .to_string();

        self.cache.insert(actor_iri.as_str(), &pem);
        Ok(pem)
    }

    fn check(
        &self,
        pem: &str,
        components: &SignatureComponents,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
    ) -> AppResult<bool> {
        HttpVerifier::verify(pem, components, method, path, headers)
            .map_err(|e| AppError::Signature(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_owner_strips_fragment() {
        assert_eq!(
            key_owner("https://a.example/users/alice#main-key").unwrap(),
            KeyOwner::Iri(Url::parse("https://a.example/users/alice").unwrap())
        );
    }

    #[test]
    fn test_key_owner_strips_known_suffixes() {
        assert_eq!(
            key_owner("https://a.example/users/alice/publickey").unwrap(),
            KeyOwner::Iri(Url::parse("https://a.example/users/alice").unwrap())
        );
        assert_eq!(
            key_owner("https://a.example/users/alice/main-key").unwrap(),
            KeyOwner::Iri(Url::parse("https://a.example/users/alice").unwrap())
        );
    }

    #[test]
    fn test_key_owner_passes_acct_to_webfinger() {
        assert_eq!(
            key_owner("acct:alice@a.example").unwrap(),
            KeyOwner::Acct("alice@a.example".to_string())
        );
    }

    #[test]
    fn test_key_owner_rejects_undereferenceable_schemes() {
        assert!(key_owner("data:text/plain,nope").is_err());
        assert!(key_owner("not a url at all").is_err());
    }
}
