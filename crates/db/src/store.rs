//! Repository traits consumed by the federation layer.

use async_trait::async_trait;
use fediwire_common::AppResult;
use serde_json::Value as Json;

use crate::models::{
    ActorKeypair, CollectionItem, Direction, FollowEdge, FollowState, LikeRecord, MailboxEntry,
    ObjectRecord, Visibility,
};

/// An id-bounded window over an ordered collection.
///
/// Bounds are strict (`min_id < id < max_id`); results order by
/// descending id. Because ids are commit-time monotonic, the same query
/// returns the same window no matter when it runs.
#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    /// Exclusive lower bound.
    pub min_id: Option<String>,
    /// Exclusive upper bound.
    pub max_id: Option<String>,
    /// Maximum number of items returned.
    pub limit: u64,
}

impl RangeQuery {
    /// The newest `limit` items, unbounded.
    #[must_use]
    pub const fn latest(limit: u64) -> Self {
        Self {
            min_id: None,
            max_id: None,
            limit,
        }
    }

    /// Whether `id` falls inside the window.
    #[must_use]
    pub fn admits(&self, id: &str) -> bool {
        self.max_id.as_deref().is_none_or(|max| id < max)
            && self.min_id.as_deref().is_none_or(|min| id > min)
    }
}

/// Objects and activities, by opaque id and canonical IRI.
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Fetch by opaque id.
    async fn object_by_id(&self, id: &str) -> AppResult<Option<ObjectRecord>>;

    /// Fetch by canonical IRI.
    async fn object_by_iri(&self, iri: &str) -> AppResult<Option<ObjectRecord>>;

    /// Whether an object with this IRI is persisted.
    async fn object_exists(&self, iri: &str) -> AppResult<bool>;

    /// Persist a new object; the store assigns the commit-time id.
    async fn insert_object(
        &self,
        iri: &str,
        object_type: &str,
        local: bool,
        actor_iri: Option<&str>,
        data: Json,
    ) -> AppResult<ObjectRecord>;

    /// Replace the stored document for an IRI.
    async fn update_object(
        &self,
        iri: &str,
        object_type: &str,
        data: Json,
    ) -> AppResult<ObjectRecord>;

    /// Remove an object; `false` when no such IRI existed.
    async fn delete_object(&self, iri: &str) -> AppResult<bool>;
}

/// Inbox/outbox links.
#[async_trait]
pub trait MailboxRepository: Send + Sync {
    /// Link an activity into an actor's mailbox. Idempotent per
    /// `(actor, activity, direction)`.
    async fn link_mailbox(
        &self,
        actor_iri: &str,
        activity_iri: &str,
        direction: Direction,
        visibility: Visibility,
    ) -> AppResult<MailboxEntry>;

    /// One id-bounded page, newest first.
    async fn mailbox_page(
        &self,
        actor_iri: &str,
        direction: Direction,
        query: &RangeQuery,
    ) -> AppResult<Vec<MailboxEntry>>;

    /// Total linked activities.
    async fn mailbox_count(&self, actor_iri: &str, direction: Direction) -> AppResult<u64>;

    /// Whether an activity is linked into this mailbox.
    async fn mailbox_contains(
        &self,
        actor_iri: &str,
        direction: Direction,
        activity_iri: &str,
    ) -> AppResult<bool>;
}

/// Likes authored by local actors.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Record a like. Idempotent per `(actor, object)`: a second call
    /// returns the existing record unchanged.
    async fn upsert_like(&self, actor_iri: &str, object_iri: &str) -> AppResult<LikeRecord>;

    /// One id-bounded page of the actor's likes, newest first.
    async fn likes_page(&self, actor_iri: &str, query: &RangeQuery)
    -> AppResult<Vec<LikeRecord>>;

    /// Total likes by this actor.
    async fn likes_count(&self, actor_iri: &str) -> AppResult<u64>;

    /// Whether the actor has liked this object.
    async fn likes_contains(&self, actor_iri: &str, object_iri: &str) -> AppResult<bool>;
}

/// Directional follow edges.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create or update the edge `follower -> followee`. Idempotent per
    /// pair; an existing edge keeps its id and moves to `state`.
    async fn upsert_follow(
        &self,
        follower_iri: &str,
        followee_iri: &str,
        state: FollowState,
    ) -> AppResult<FollowEdge>;

    /// Accepted edges where `actor` is the follower, newest first.
    async fn following_page(
        &self,
        actor_iri: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<FollowEdge>>;

    /// Accepted edges where `actor` is the followee, newest first.
    async fn followers_page(
        &self,
        actor_iri: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<FollowEdge>>;

    /// Count of accepted following edges.
    async fn following_count(&self, actor_iri: &str) -> AppResult<u64>;

    /// Count of accepted follower edges.
    async fn followers_count(&self, actor_iri: &str) -> AppResult<u64>;

    /// Raw edge state regardless of acceptance.
    async fn follow_state(
        &self,
        follower_iri: &str,
        followee_iri: &str,
    ) -> AppResult<Option<FollowState>>;
}

/// Named per-actor collections.
#[async_trait]
pub trait CollectionItemRepository: Send + Sync {
    /// Add an object to a named collection. Idempotent per
    /// `(actor, collection, object)`.
    async fn insert_collection_item(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
        object_type: &str,
    ) -> AppResult<CollectionItem>;

    /// One id-bounded page, newest first.
    async fn collection_page(
        &self,
        actor_iri: &str,
        collection: &str,
        query: &RangeQuery,
    ) -> AppResult<Vec<CollectionItem>>;

    /// Total items in the collection.
    async fn collection_count(&self, actor_iri: &str, collection: &str) -> AppResult<u64>;

    /// Whether the object is a member.
    async fn collection_contains(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
    ) -> AppResult<bool>;

    /// Remove an object; `false` when it was not a member.
    async fn remove_collection_item(
        &self,
        actor_iri: &str,
        collection: &str,
        object_iri: &str,
    ) -> AppResult<bool>;
}

/// Actor signing keys.
#[async_trait]
pub trait KeypairRepository: Send + Sync {
    /// The actor's keypair, if one was generated.
    async fn keypair(&self, actor_iri: &str) -> AppResult<Option<ActorKeypair>>;

    /// Store a keypair for an actor. Idempotent: an existing keypair is
    /// returned unchanged, never overwritten.
    async fn put_keypair(
        &self,
        actor_iri: &str,
        public_key_pem: &str,
        private_key_pem: &str,
    ) -> AppResult<ActorKeypair>;
}

/// The full persistence surface the federation layer consumes.
pub trait Store:
    ObjectRepository
    + MailboxRepository
    + LikeRepository
    + FollowRepository
    + CollectionItemRepository
    + KeypairRepository
{
}

impl<T> Store for T where
    T: ObjectRepository
        + MailboxRepository
        + LikeRepository
        + FollowRepository
        + CollectionItemRepository
        + KeypairRepository
{
}
