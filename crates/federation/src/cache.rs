//! Public-key caching for inbound signature verification.
//!
//! A small in-process TTL cache with explicit invalidation. The only
//! consumer is the inbound verifier, which invalidates an entry on
//! verification failure and refetches exactly once.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

/// Default cache TTL: 24 hours.
const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

/// A cached actor public key.
#[derive(Debug, Clone)]
pub struct CachedKey {
    /// Key owner's actor IRI.
    pub owner: String,
    /// Public key in PEM format.
    pub public_key_pem: String,
    /// When this entry was created.
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

impl CachedKey {
    /// Whether the entry has outlived the TTL.
    #[must_use]
    pub fn is_stale(&self, ttl_secs: i64) -> bool {
        let age = chrono::Utc::now() - self.cached_at;
        age.num_seconds() >= ttl_secs
    }
}

/// TTL-bounded actor key cache.
#[derive(Debug)]
pub struct KeyCache {
    entries: RwLock<HashMap<String, CachedKey>>,
    ttl_secs: i64,
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl KeyCache {
    /// Create a cache with the given TTL.
    #[must_use]
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// The cached key for an actor, unless absent or stale.
    #[must_use]
    pub fn get(&self, owner: &str) -> Option<CachedKey> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(owner)?;
        if entry.is_stale(self.ttl_secs) {
            return None;
        }
        Some(entry.clone())
    }

    /// Cache an actor's public key.
    pub fn insert(&self, owner: &str, public_key_pem: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                owner.to_string(),
                CachedKey {
                    owner: owner.to_string(),
                    public_key_pem: public_key_pem.to_string(),
                    cached_at: chrono::Utc::now(),
                },
            );
        }
    }

    /// Drop an actor's cached key (verification failed, or an Update
    /// activity announced rotation).
    pub fn invalidate(&self, owner: &str) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.remove(owner).is_some() {
                debug!(owner = %owner, "Invalidated cached key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "https://a.example/users/alice";

    #[test]
    fn test_insert_get_invalidate() {
        let cache = KeyCache::default();
        assert!(cache.get(ALICE).is_none());

        cache.insert(ALICE, "pem");
        assert_eq!(cache.get(ALICE).map(|k| k.public_key_pem), Some("pem".to_string()));

        cache.invalidate(ALICE);
        assert!(cache.get(ALICE).is_none());
    }

    #[test]
    fn test_stale_entries_are_misses() {
        let cache = KeyCache::new(0);
        cache.insert(ALICE, "pem");
        assert!(cache.get(ALICE).is_none());
    }
}
