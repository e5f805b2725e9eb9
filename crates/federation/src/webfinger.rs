//! `WebFinger` lookup client.
//!
//! The one lookup the federation core needs: resolve an
//! `acct:user@domain` handle to the account's actor IRI via the
//! domain's `/.well-known/webfinger` endpoint.

use std::time::Duration;

use fediwire_common::{AppError, AppResult, FederationConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// A JRD link entry.
#[derive(Debug, Deserialize)]
pub struct WebfingerLink {
    /// Link relation.
    pub rel: String,
    /// Media type of the target.
    #[serde(rename = "type")]
    pub link_type: Option<String>,
    /// Target URL.
    pub href: Option<String>,
}

/// A JRD document.
#[derive(Debug, Deserialize)]
pub struct WebfingerDocument {
    /// The queried resource.
    pub subject: Option<String>,
    /// Link entries.
    #[serde(default)]
    pub links: Vec<WebfingerLink>,
}

/// The `rel="self"` ActivityPub link of a JRD document, if any.
#[must_use]
pub fn actor_iri_from_jrd(document: &WebfingerDocument) -> Option<Url> {
    document
        .links
        .iter()
        .find(|link| {
            link.rel == "self"
                && link
                    .link_type
                    .as_deref()
                    .is_some_and(|t| t.contains("activity+json") || t.contains("ld+json"))
        })
        .and_then(|link| link.href.as_deref())
        .and_then(|href| Url::parse(href).ok())
}

/// Client for the single `WebFinger` lookup the core requires.
#[derive(Clone)]
pub struct WebfingerClient {
    client: Client,
    user_agent: String,
}

impl WebfingerClient {
    /// Create a client with the federation request timeout.
    pub fn new(config: &FederationConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            user_agent: format!("fediwire/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Resolve `user@domain` (with or without the `acct:` prefix) to the
    /// account's actor IRI.
    pub async fn resolve(&self, resource: &str) -> AppResult<Url> {
        let handle = resource.strip_prefix("acct:").unwrap_or(resource);
        let (user, domain) = handle
            .split_once('@')
            .ok_or_else(|| AppError::BadRequest(format!("not an account handle: {resource}")))?;

        let lookup = format!(
            "https://{domain}/.well-known/webfinger?resource={}",
            urlencoding::encode(&format!("acct:{user}@{domain}"))
        );

        debug!(resource = %handle, "WebFinger lookup");

        let response = self
            .client
            .get(&lookup)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/jrd+json, application/json")
            .send()
            .await
            .map_err(|e| AppError::Delivery {
                recipients: vec![lookup.clone()],
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::NotFound(format!("webfinger: {handle}")));
        }

        let document: WebfingerDocument = response
            .json()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid JRD document: {e}")))?;

        actor_iri_from_jrd(&document)
            .ok_or_else(|| AppError::NotFound(format!("no actor link for {handle}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_iri_from_jrd_picks_self_link() {
        let document: WebfingerDocument = serde_json::from_value(serde_json::json!({
            "subject": "acct:alice@a.example",
            "links": [
                {"rel": "http://webfinger.net/rel/profile-page", "type": "text/html",
                 "href": "https://a.example/@alice"},
                {"rel": "self", "type": "application/activity+json",
                 "href": "https://a.example/users/alice"},
            ],
        }))
        .unwrap();

        assert_eq!(
            actor_iri_from_jrd(&document).unwrap().as_str(),
            "https://a.example/users/alice"
        );
    }

    #[test]
    fn test_jrd_without_actor_link_is_none() {
        let document: WebfingerDocument = serde_json::from_value(serde_json::json!({
            "subject": "acct:alice@a.example",
            "links": [
                {"rel": "self", "type": "text/html", "href": "https://a.example/@alice"},
            ],
        }))
        .unwrap();
        assert!(actor_iri_from_jrd(&document).is_none());
    }
}
