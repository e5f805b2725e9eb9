//! Record models persisted by the federation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Mailbox direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Received activity (inbox).
    In,
    /// Authored activity (outbox).
    Out,
}

/// Addressing-derived visibility of a mailbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Addressed to the public collection in `to`.
    Public,
    /// Addressed to the public collection only in `cc`.
    Unlisted,
    /// Addressed to the owner's followers collection.
    Followers,
    /// Addressed to specific actors only.
    Direct,
}

/// State of a follow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowState {
    /// Requested, not yet accepted.
    Pending,
    /// Accepted; the edge is a collection member.
    Accepted,
    /// Rejected; kept for dedup, never a member.
    Rejected,
}

/// A persisted object or activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Opaque commit-time id (ULID).
    pub id: String,
    /// Canonical IRI.
    pub iri: String,
    /// `ActivityStreams` type name.
    pub object_type: String,
    /// Whether this instance owns the object.
    pub local: bool,
    /// IRI of the actor the object is attributed to, when known.
    pub actor_iri: Option<String>,
    /// Re-serialized JSON-LD document.
    pub data: Json,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// A mailbox link between an actor and a persisted activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    /// Opaque commit-time id (ULID).
    pub id: String,
    /// Owning actor IRI.
    pub actor_iri: String,
    /// IRI of the linked activity.
    pub activity_iri: String,
    /// Inbox or outbox.
    pub direction: Direction,
    /// Visibility computed from the activity's addressing.
    pub visibility: Visibility,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// A like authored by an actor, unique per `(actor, object)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRecord {
    /// Opaque commit-time id (ULID).
    pub id: String,
    /// Liking actor IRI.
    pub actor_iri: String,
    /// Liked object IRI.
    pub object_iri: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// A directional follow edge, unique per `(follower, followee)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Opaque commit-time id (ULID).
    pub id: String,
    /// Following actor IRI.
    pub follower_iri: String,
    /// Followed actor IRI.
    pub followee_iri: String,
    /// Edge state; only `accepted` edges are collection members.
    pub state: FollowState,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Membership of an object in an actor's named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Opaque commit-time id (ULID).
    pub id: String,
    /// Owning actor IRI.
    pub actor_iri: String,
    /// Collection name (the IRI's final path segment).
    pub collection: String,
    /// Member object IRI.
    pub object_iri: String,
    /// Best-effort object type placeholder; no dereference performed.
    pub object_type: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Signing key material owned by exactly one local actor.
///
/// Generated once at actor registration; the private key's lifetime
/// equals the actor's and it is never transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorKeypair {
    /// Owning actor IRI.
    pub actor_iri: String,
    /// Public key in SPKI PEM format.
    pub public_key_pem: String,
    /// Private key in PKCS#8 PEM format.
    pub private_key_pem: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
