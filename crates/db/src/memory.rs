//! In-memory store implementation.
//!
//! Backs the integration tests and storeless embedders. Tables are
//! `BTreeMap`s keyed by commit-time ULID, so descending range scans are
//! plain reverse iteration and every query is a deterministic function
//! of committed ids.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use fediwire_common::{AppError, AppResult, MonotonicIdGenerator};
use serde_json::Value as Json;

use crate::models::{
    ActorKeypair, CollectionItem, Direction, FollowEdge, FollowState, LikeRecord, MailboxEntry,
    ObjectRecord, Visibility,
};
use crate::store::{
    CollectionItemRepository, FollowRepository, KeypairRepository, LikeRepository,
    MailboxRepository, ObjectRepository, RangeQuery,
};

#[derive(Debug, Default)]
struct Tables {
    objects: BTreeMap<String, ObjectRecord>,
    objects_by_iri: HashMap<String, String>,
    mailbox: BTreeMap<String, MailboxEntry>,
    likes: BTreeMap<String, LikeRecord>,
    follows: BTreeMap<String, FollowEdge>,
    collection_items: BTreeMap<String, CollectionItem>,
    keypairs: HashMap<String, ActorKeypair>,
}

/// In-memory implementation of every repository trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    ids: MonotonicIdGenerator,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> AppResult<R> {
        let tables = self
            .tables
            .read()
            .map_err(|_| AppError::Database("store lock poisoned".to_string()))?;
        Ok(f(&tables))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables, &MonotonicIdGenerator) -> R) -> AppResult<R> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| AppError::Database("store lock poisoned".to_string()))?;
        Ok(f(&mut tables, &self.ids))
    }
}

/// Newest-first scan of a ULID-keyed table.
fn page_of<'a, T: Clone + 'a>(
    table: impl DoubleEndedIterator<Item = (&'a String, &'a T)>,
    query: &RangeQuery,
    mut matches: impl FnMut(&T) -> bool,
) -> Vec<T> {
    table
        .rev()
        .filter(|(id, record)| query.admits(id) && matches(record))
        .take(query.limit as usize)
        .map(|(_, record)| record.clone())
        .collect()
}

#[async_trait]
impl ObjectRepository for MemoryStore {
    async fn object_by_id(&self, id: &str) -> AppResult<Option<ObjectRecord>> {
        self.read(|t| t.objects.get(id).cloned())
    }

    async fn object_by_iri(&self, iri: &str) -> AppResult<Option<ObjectRecord>> {
        self.read(|t| {
            t.objects_by_iri
                .get(iri)
                .and_then(|id| t.objects.get(id))
                .cloned()
        })
    }

    async fn object_exists(&self, iri: &str) -> AppResult<bool> {
        self.read(|t| t.objects_by_iri.contains_key(iri))
    }

    async fn insert_object(
        &self,
        iri: &str,
        object_type: &str,
        local: bool,
        actor_iri: Option<&str>,
        data: Json,
    ) -> AppResult<ObjectRecord> {
        self.write(|t, ids| {
            if let Some(existing) = t.objects_by_iri.get(iri).and_then(|id| t.objects.get(id)) {
                return existing.clone();
            }
            let record = ObjectRecord {
                id: ids.generate(),
                iri: iri.to_string(),
                object_type: object_type.to_string(),
                local,
                actor_iri: actor_iri.map(String::from),
                data,
                created_at: Utc::now(),
            };
            t.objects_by_iri.insert(iri.to_string(), record.id.clone());
            t.objects.insert(record.id.clone(), record.clone());
            record
        })
    }

    async fn update_object(
        &self,
        iri: &str,
        object_type: &str,
        data: Json,
    ) -> AppResult<ObjectRecord> {
        self.write(|t, _| {
            let id = t.objects_by_iri.get(iri).cloned()?;
            let record = t.objects.get_mut(&id)?;
            record.object_type = object_type.to_string();
            record.data = data;
            Some(record.clone())
        })?
        .ok_or_else(|| AppError::NotFound(iri.to_string()))
    }

    async fn delete_object(&self, iri: &str) -> AppResult<bool> {
        self.write(|t, _| {
            t.objects_by_iri
                .remove(iri)
                .and_then(|id| t.objects.remove(&id))
                .is_some()
        })
    }
}

#[async_trait]
impl MailboxRepository for MemoryStore {
    async fn link_mailbox(
        &self,
        actor_iri: &str,
        activity_iri: &str,
        direction: Direction,
        visibility: Visibility,
    ) -> AppResult<MailboxEntry> {
        self.write(|t, ids| {
            if let Some(existing) = t.mailbox.values().find(|e| {
                e.actor_iri == actor_iri
                    && e.activity_iri == activity_iri
                    && e.direction == direction
            }) {
                return existing.clone();
            }
            let entry = MailboxEntry {
                id: ids.generate(),
                actor_iri: actor_iri.to_string(),
                activity_iri: activity_iri.to_string(),
                direction,
                visibility,
                created_at: Utc::now(),
            };
            t.mailbox.insert(entry.id.clone(), entry.clone());
            entry
        })
    }

    async fn mailbox_page(
        &self,
        actor_iri: &str,
        direction: Direction,
        query: &RangeQuery,
    ) -> AppResult<Vec<MailboxEntry>> {
        self.read(|t| {
            page_of(t.mailbox.iter(), query, |e| {
                e.actor_iri == actor_iri && e.direction == direction
            })
        })
    }

    async fn mailbox_count(&self, actor_iri: &str, direction: Direction) -> AppResult<u64> {
        self.read(|t| {
            t.mailbox
                .values()
                .filter(|e| e.actor_iri == actor_iri && e.direction == direction)
                .count() as u64
        })
    }

    async fn mailbox_contains(
        &self,
        actor_iri: &str,
        direction: Direction,
        activity_iri: &str,
    ) -> AppResult<bool> {
        self.read(|t| {
            t.mailbox.values().any(|e| {
                e.actor_iri == actor_iri
                    && e.direction == direction
                    && e.activity_iri == activity_iri
            })
        })
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn upsert_like(&self, actor_iri: &str, object_iri: &str) -> AppResult<LikeRecord> {
        self.write(|t, ids| {
            if let Some(existing) = t
                .likes
                .values()
                .find(|l| l.actor_iri == actor_iri && l.object_iri == object_iri)
            {
                return existing.clone();
            }
            let record = LikeRecord {
                id: ids.generate(),
                actor_iri: actor_iri.to_string(),
                object_iri: object_iri.to_string(),
                created_at: Utc::now(),
            };
            t.likes.insert(record.id.clone(), record.clone());
            record
        })
    }

    async fn likes_page(
        &self,
        actor_iri: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<LikeRecord>> {
        self.read(|t| page_of(t.likes.iter(), query, |l| l.actor_iri == actor_iri))
    }

    async fn likes_count(&self, actor_iri: &str) -> AppResult<u64> {
        self.read(|t| t.likes.values().filter(|l| l.actor_iri == actor_iri).count() as u64)
    }

    async fn likes_contains(&self, actor_iri: &str, object_iri: &str) -> AppResult<bool> {
        self.read(|t| {
            t.likes
                .values()
                .any(|l| l.actor_iri == actor_iri && l.object_iri == object_iri)
        })
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn upsert_follow(
        &self,
        follower_iri: &str,
        followee_iri: &str,
        state: FollowState,
    ) -> AppResult<FollowEdge> {
        self.write(|t, ids| {
            if let Some(existing) = t
                .follows
                .values_mut()
                .find(|e| e.follower_iri == follower_iri && e.followee_iri == followee_iri)
            {
                existing.state = state;
                return existing.clone();
            }
            let edge = FollowEdge {
                id: ids.generate(),
                follower_iri: follower_iri.to_string(),
                followee_iri: followee_iri.to_string(),
                state,
                created_at: Utc::now(),
            };
            t.follows.insert(edge.id.clone(), edge.clone());
            edge
        })
    }

    async fn following_page(
        &self,
        actor_iri: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<FollowEdge>> {
        self.read(|t| {
            page_of(t.follows.iter(), query, |e| {
                e.follower_iri == actor_iri && e.state == FollowState::Accepted
            })
        })
    }

    async fn followers_page(
        &self,
        actor_iri: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<FollowEdge>> {
        self.read(|t| {
            page_of(t.follows.iter(), query, |e| {
                e.followee_iri == actor_iri && e.state == FollowState::Accepted
            })
        })
    }

    async fn following_count(&self, actor_iri: &str) -> AppResult<u64> {
        self.read(|t| {
            t.follows
                .values()
                .filter(|e| e.follower_iri == actor_iri && e.state == FollowState::Accepted)
                .count() as u64
        })
    }

    async fn followers_count(&self, actor_iri: &str) -> AppResult<u64> {
        self.read(|t| {
            t.follows
                .values()
                .filter(|e| e.followee_iri == actor_iri && e.state == FollowState::Accepted)
                .count() as u64
        })
    }

    async fn follow_state(
        &self,
        follower_iri: &str,
        followee_iri: &str,
    ) -> AppResult<Option<FollowState>> {
        self.read(|t| {
            t.follows
                .values()
                .find(|e| e.follower_iri == follower_iri && e.followee_iri == followee_iri)
                .map(|e| e.state)
        })
    }
}

#[async_trait]
impl CollectionItemRepository for MemoryStore {
    async fn insert_collection_item(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
        object_type: &str,
    ) -> AppResult<CollectionItem> {
        self.write(|t, ids| {
            if let Some(existing) = t.collection_items.values().find(|i| {
                i.actor_iri == actor_iri
                    && i.collection == collection
                    && i.object_iri == object_iri
            }) {
                return existing.clone();
            }
            let item = CollectionItem {
                id: ids.generate(),
                actor_iri: actor_iri.to_string(),
                collection: collection.to_string(),
                object_iri: object_iri.to_string(),
                object_type: object_type.to_string(),
                created_at: Utc::now(),
            };
            t.collection_items.insert(item.id.clone(), item.clone());
            item
        })
    }

    async fn collection_page(
        &self,
        actor_iri: &str,
        collection: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<CollectionItem>> {
        self.read(|t| {
            page_of(t.collection_items.iter(), query, |i| {
                i.actor_iri == actor_iri && i.collection == collection
            })
        })
    }

    async fn collection_count(&self, actor_iri: &str, collection: &str) -> AppResult<u64> {
        self.read(|t| {
            t.collection_items
                .values()
                .filter(|i| i.actor_iri == actor_iri && i.collection == collection)
                .count() as u64
        })
    }

    async fn collection_contains(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
    ) -> AppResult<bool> {
        self.read(|t| {
            t.collection_items.values().any(|i| {
                i.actor_iri == actor_iri
                    && i.collection == collection
                    && i.object_iri == object_iri
            })
        })
    }

    async fn remove_collection_item(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
    ) -> AppResult<bool> {
        self.write(|t, _| {
            let ids: Vec<String> = t
                .collection_items
                .iter()
                .filter(|(_, i)| {
                    i.actor_iri == actor_iri
                        && i.collection == collection
                        && i.object_iri == object_iri
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                t.collection_items.remove(id);
            }
            !ids.is_empty()
        })
    }
}

#[async_trait]
impl KeypairRepository for MemoryStore {
    async fn keypair(&self, actor_iri: &str) -> AppResult<Option<ActorKeypair>> {
        self.read(|t| t.keypairs.get(actor_iri).cloned())
    }

    async fn put_keypair(
        &self,
        actor_iri: &str,
        public_key_pem: &str,
        private_key_pem: &str,
    ) -> AppResult<ActorKeypair> {
        self.write(|t, _| {
            t.keypairs
                .entry(actor_iri.to_string())
                .or_insert_with(|| ActorKeypair {
                    actor_iri: actor_iri.to_string(),
                    public_key_pem: public_key_pem.to_string(),
                    private_key_pem: private_key_pem.to_string(),
                    created_at: Utc::now(),
                })
                .clone()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALICE: &str = "https://a.example/users/alice";

    #[tokio::test]
    async fn test_object_crud_by_iri() {
        let store = MemoryStore::new();
        let iri = "https://a.example/users/alice/objects/1";

        let record = store
            .insert_object(iri, "Note", true, Some(ALICE), serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert!(store.object_exists(iri).await.unwrap());
        assert_eq!(store.object_by_id(&record.id).await.unwrap().unwrap().iri, iri);

        assert!(store.delete_object(iri).await.unwrap());
        assert!(!store.object_exists(iri).await.unwrap());
        assert!(!store.delete_object(iri).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_object_is_idempotent_per_iri() {
        let store = MemoryStore::new();
        let iri = "https://a.example/users/alice/objects/1";

        let first = store
            .insert_object(iri, "Note", true, None, serde_json::json!({}))
            .await
            .unwrap();
        let second = store
            .insert_object(iri, "Note", true, None, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_like_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let object = "https://b.example/notes/9";

        let first = store.upsert_like(ALICE, object).await.unwrap();
        let second = store.upsert_like(ALICE, object).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.likes_count(ALICE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follow_upsert_keeps_id_across_states() {
        let store = MemoryStore::new();
        let bob = "https://b.example/users/bob";

        let pending = store
            .upsert_follow(ALICE, bob, FollowState::Pending)
            .await
            .unwrap();
        assert_eq!(store.following_count(ALICE).await.unwrap(), 0);

        let accepted = store
            .upsert_follow(ALICE, bob, FollowState::Accepted)
            .await
            .unwrap();
        assert_eq!(pending.id, accepted.id);
        assert_eq!(store.following_count(ALICE).await.unwrap(), 1);
        assert_eq!(
            store.follow_state(ALICE, bob).await.unwrap(),
            Some(FollowState::Accepted)
        );
    }

    #[tokio::test]
    async fn test_pages_are_newest_first_and_bounded() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for n in 0..5 {
            let item = store
                .insert_collection_item(ALICE, "pins", &format!("https://b.example/{n}"), "Note")
                .await
                .unwrap();
            ids.push(item.id);
        }

        let page = store
            .collection_page(ALICE, "pins", &RangeQuery::latest(3))
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].id, ids[4]);
        assert_eq!(page[2].id, ids[2]);

        // Items committed above the max_id bound never appear.
        let bounded = store
            .collection_page(
                ALICE,
                "pins",
                &RangeQuery {
                    min_id: None,
                    max_id: Some(ids[2].clone()),
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(bounded.len(), 2);
        assert!(bounded.iter().all(|i| i.id < ids[2]));
    }

    #[tokio::test]
    async fn test_keypair_is_never_overwritten() {
        let store = MemoryStore::new();
        let first = store.put_keypair(ALICE, "pub-1", "priv-1").await.unwrap();
        let second = store.put_keypair(ALICE, "pub-2", "priv-2").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.public_key_pem, "pub-1");
    }
}
