//! Signed delivery transport.
//!
//! A transport binds one local actor's signing key (or none, for
//! anonymous discovery GETs) to dereference and delivery calls. Batch
//! delivery fans out per recipient with bounded concurrency and reports
//! every failing recipient in one aggregate error so callers can retry
//! exactly the failed subset.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fediwire_common::{AppError, AppResult, FederationConfig, generate_rsa_keypair};
use fediwire_db::{ActorKeypair, KeypairRepository, ObjectRepository};
use futures::{StreamExt, stream};
use reqwest::Client;
use serde_json::Value as Json;
use tracing::{debug, info, warn};
use url::Url;

use crate::iri::Origin;
use crate::signature::HttpSigner;

const ACTIVITY_JSON: &str = "application/activity+json";

/// HTTP transport for dereferencing and delivering activities.
#[derive(Clone)]
pub struct Transport<S> {
    client: Client,
    objects: Arc<S>,
    origin: Origin,
    signer: Option<Arc<HttpSigner>>,
    user_agent: String,
    concurrency: usize,
}

impl<S: ObjectRepository> Transport<S> {
    /// A non-signing transport for unauthenticated discovery GETs.
    pub fn anonymous(
        objects: Arc<S>,
        origin: Origin,
        config: &FederationConfig,
    ) -> AppResult<Self> {
        Self::build(objects, origin, config, None)
    }

    /// A transport signing as `actor_iri` with key id
    /// `{actor_iri}#main-key`.
    pub fn credentialed(
        objects: Arc<S>,
        origin: Origin,
        config: &FederationConfig,
        actor_iri: &Url,
        private_key_pem: &str,
    ) -> AppResult<Self> {
        let key_id = format!("{actor_iri}#main-key");
        let signer = HttpSigner::new(private_key_pem, key_id)
            .map_err(|e| AppError::Signature(e.to_string()))?;
        Self::build(objects, origin, config, Some(Arc::new(signer)))
    }

    fn build(
        objects: Arc<S>,
        origin: Origin,
        config: &FederationConfig,
        signer: Option<Arc<HttpSigner>>,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            objects,
            origin,
            signer,
            user_agent: format!("fediwire/{}", env!("CARGO_PKG_VERSION")),
            concurrency: config.delivery_concurrency.max(1),
        })
    }

    /// Fetch an object by IRI.
    ///
    /// Local IRIs are served straight from the store without a network
    /// call; remote IRIs get a (signed, when credentialed) GET.
    pub async fn dereference(&self, iri: &Url) -> AppResult<Json> {
        if self.origin.is_local(iri) {
            return self
                .objects
                .object_by_iri(iri.as_str())
                .await?
                .map(|record| record.data)
                .ok_or_else(|| AppError::NotFound(iri.to_string()));
        }

        debug!(iri = %iri, "Dereferencing remote object");

        let mut request = self
            .client
            .get(iri.clone())
            .header("User-Agent", &self.user_agent)
            .header("Accept", ACTIVITY_JSON);

        if let Some(signer) = &self.signer {
            let headers = signer
                .sign_request("GET", iri, None)
                .map_err(|e| AppError::Signature(e.to_string()))?;
            request = request.headers(headers);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(iri, &e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(iri, &format!("GET returned {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| transport_error(iri, &format!("invalid JSON body: {e}")))
    }

    /// Deliver one activity to one inbox via signed POST.
    ///
    /// Success is HTTP 200/201/202. A `410 Gone` recipient is treated
    /// as delivered so a deleted actor does not stay on the retry list
    /// forever. Timeouts surface as delivery errors; the transport
    /// itself never retries.
    pub async fn deliver(&self, body: &Json, inbox: &Url) -> AppResult<()> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AppError::Signature("delivery requires a credentialed transport".to_string()))?;

        let bytes = serde_json::to_vec(body)
            .map_err(|e| AppError::Internal(format!("activity failed to serialize: {e}")))?;

        let headers = signer
            .sign_request("POST", inbox, Some(&bytes))
            .map_err(|e| AppError::Signature(e.to_string()))?;

        debug!(
            inbox = %inbox,
            activity_type = body.get("type").and_then(Json::as_str).unwrap_or("Unknown"),
            "Delivering activity"
        );

        let response = self
            .client
            .post(inbox.clone())
            .headers(headers)
            .header("User-Agent", &self.user_agent)
            .header("Content-Type", ACTIVITY_JSON)
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error(inbox, &e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200 | 201 | 202 => {
                info!(inbox = %inbox, status = %status, "Activity delivered");
                Ok(())
            }
            410 => {
                warn!(inbox = %inbox, "Remote actor is gone (410)");
                Ok(())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(transport_error(inbox, &format!("POST returned {status}: {body}")))
            }
        }
    }

    /// Deliver one activity to many inboxes, each independently.
    ///
    /// Deliveries fan out concurrently up to the configured limit; the
    /// aggregate result is insensitive to completion order. `Ok` only
    /// when every recipient succeeded; otherwise one error naming every
    /// failing recipient.
    pub async fn batch_deliver(&self, body: &Json, recipients: &[Url]) -> AppResult<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let results: Vec<(Url, AppResult<()>)> = stream::iter(recipients.iter().cloned())
            .map(|recipient| async move {
                let outcome = self.deliver(body, &recipient).await;
                (recipient, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut failed = HashMap::new();
        for (recipient, outcome) in results {
            if let Err(err) = outcome {
                failed.insert(recipient.to_string(), err.to_string());
            }
        }

        match aggregate_failures(recipients, &failed) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn transport_error(target: &Url, reason: &str) -> AppError {
    AppError::Delivery {
        recipients: vec![target.to_string()],
        reason: reason.to_string(),
    }
}

/// Fold per-recipient failures into one aggregate error, with the
/// recipient list in the caller's original order.
fn aggregate_failures(recipients: &[Url], failed: &HashMap<String, String>) -> Option<AppError> {
    if failed.is_empty() {
        return None;
    }
    let mut failing = Vec::new();
    let mut reasons = Vec::new();
    for recipient in recipients {
        if let Some(reason) = failed.get(recipient.as_str()) {
            failing.push(recipient.to_string());
            reasons.push(format!("{recipient}: {reason}"));
        }
    }
    Some(AppError::Delivery {
        recipients: failing,
        reason: reasons.join("; "),
    })
}

/// The actor's signing credential, generating one the first time.
///
/// Each local actor owns exactly one keypair; an existing keypair is
/// never regenerated or overwritten.
pub async fn ensure_keypair<S: KeypairRepository>(
    store: &S,
    actor_iri: &Url,
) -> AppResult<ActorKeypair> {
    if let Some(existing) = store.keypair(actor_iri.as_str()).await? {
        return Ok(existing);
    }
    let generated = generate_rsa_keypair()?;
    store
        .put_keypair(
            actor_iri.as_str(),
            &generated.public_key_pem,
            &generated.private_key_pem,
        )
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fediwire_db::MemoryStore;

    fn recipients(urls: &[&str]) -> Vec<Url> {
        urls.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    #[test]
    fn test_aggregate_names_only_failing_recipients() {
        let all = recipients(&[
            "https://r1.example/inbox",
            "https://r2.example/inbox",
            "https://r3.example/inbox",
        ]);
        let mut failed = HashMap::new();
        failed.insert("https://r2.example/inbox".to_string(), "timeout".to_string());

        let err = aggregate_failures(&all, &failed).unwrap();
        let AppError::Delivery { recipients, reason } = err else {
            panic!("expected delivery error");
        };
        assert_eq!(recipients, vec!["https://r2.example/inbox"]);
        assert!(reason.contains("timeout"));
    }

    #[test]
    fn test_aggregate_preserves_caller_order() {
        let all = recipients(&[
            "https://r1.example/inbox",
            "https://r2.example/inbox",
            "https://r3.example/inbox",
        ]);
        let mut failed = HashMap::new();
        // Inserted out of order; completion order must not matter.
        failed.insert("https://r3.example/inbox".to_string(), "503".to_string());
        failed.insert("https://r1.example/inbox".to_string(), "timeout".to_string());

        let err = aggregate_failures(&all, &failed).unwrap();
        let AppError::Delivery { recipients, .. } = err else {
            panic!("expected delivery error");
        };
        assert_eq!(
            recipients,
            vec!["https://r1.example/inbox", "https://r3.example/inbox"]
        );
    }

    #[test]
    fn test_no_failures_is_no_error() {
        let all = recipients(&["https://r1.example/inbox"]);
        assert!(aggregate_failures(&all, &HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_unsigned_transport_refuses_delivery() {
        let store = Arc::new(MemoryStore::new());
        let origin = Origin::new(Url::parse("https://a.example").unwrap()).unwrap();
        let transport =
            Transport::anonymous(store, origin, &FederationConfig::default()).unwrap();

        let err = transport
            .deliver(
                &serde_json::json!({"type": "Create"}),
                &Url::parse("https://remote.example/inbox").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Signature(_)));
    }

    #[tokio::test]
    async fn test_local_dereference_skips_network() {
        let store = Arc::new(MemoryStore::new());
        let origin = Origin::new(Url::parse("https://a.example").unwrap()).unwrap();
        let iri = "https://a.example/users/alice/objects/01note";
        store
            .insert_object(iri, "Note", true, None, serde_json::json!({"content": "hi"}))
            .await
            .unwrap();

        let transport =
            Transport::anonymous(store, origin, &FederationConfig::default()).unwrap();
        let fetched = transport.dereference(&Url::parse(iri).unwrap()).await.unwrap();
        assert_eq!(fetched, serde_json::json!({"content": "hi"}));

        let missing = transport
            .dereference(&Url::parse("https://a.example/users/alice/objects/nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ensure_keypair_generates_once() {
        let store = MemoryStore::new();
        let actor = Url::parse("https://a.example/users/alice").unwrap();

        let first = ensure_keypair(&store, &actor).await.unwrap();
        let second = ensure_keypair(&store, &actor).await.unwrap();
        assert_eq!(first.public_key_pem, second.public_key_pem);
        assert!(first.private_key_pem.contains("BEGIN PRIVATE KEY"));
    }
}
