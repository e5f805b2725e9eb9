//! `ActivityPub` collection semantics.
//!
//! Collection kind is derived from the IRI's final path segment; every
//! operation is scoped to the owner recovered from the path. Pages are
//! id-bounded windows over commit-time ids (newest first), so a page
//! captured at a `max_id` bound never shifts under concurrent inserts.

use std::sync::Arc;

use fediwire_common::{AppError, AppResult};
use fediwire_db::{Direction, FollowState, RangeQuery, Store, Visibility};
use serde::Serialize;
use serde_json::{Value as Json, json};
use tracing::{debug, warn};
use url::Url;

use crate::iri::{LocalRef, Origin};

/// The public addressing IRI.
pub const PUBLIC_IRI: &str = "https://www.w3.org/ns/activitystreams#Public";

/// The kind of a collection, derived from its final path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionKind {
    /// Received activities.
    Inbox,
    /// Authored activities.
    Outbox,
    /// Objects the owner liked.
    Liked,
    /// Actors the owner follows (accepted edges).
    Following,
    /// Actors following the owner (accepted edges).
    Followers,
    /// Any other per-actor collection.
    Named(String),
}

impl CollectionKind {
    fn from_segment(segment: &str) -> Self {
        match segment {
            "inbox" => Self::Inbox,
            "outbox" => Self::Outbox,
            "liked" => Self::Liked,
            "following" => Self::Following,
            "followers" => Self::Followers,
            other => Self::Named(other.to_string()),
        }
    }
}

/// A classified collection IRI: owner plus kind.
#[derive(Debug, Clone)]
pub struct CollectionRef {
    /// The owning actor's IRI.
    pub owner_iri: Url,
    /// The owning actor's nickname.
    pub nick: String,
    /// Collection kind.
    pub kind: CollectionKind,
    /// The collection IRI itself.
    pub iri: Url,
}

/// Pagination parameters recovered from query parameters.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    /// Exclusive lower id bound.
    pub min_id: Option<String>,
    /// Exclusive upper id bound (`?max_id=` — strictly older items).
    pub max_id: Option<String>,
    /// Page size; the engine default applies when absent.
    pub page_size: Option<u64>,
}

/// `ActivityPub` `OrderedCollection` summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Json,
    /// Always `OrderedCollection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The collection IRI.
    pub id: Url,
    /// Total committed items.
    pub total_items: u64,
    /// Link to the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<Url>,
}

/// `ActivityPub` `OrderedCollectionPage`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Json,
    /// Always `OrderedCollectionPage`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The page IRI (collection IRI plus paging query).
    pub id: Url,
    /// The collection this page belongs to.
    pub part_of: Url,
    /// Link to the strictly-older page, absent on an empty page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Url>,
    /// Page items, newest first.
    pub ordered_items: Vec<Json>,
}

fn activitystreams_context() -> Json {
    json!("https://www.w3.org/ns/activitystreams")
}

/// The collection engine: paged reads, membership, append and remove
/// over the persistence interface.
#[derive(Clone)]
pub struct CollectionEngine<S> {
    store: Arc<S>,
    origin: Origin,
    page_size: u64,
}

impl<S: Store> CollectionEngine<S> {
    /// Create an engine over a store.
    pub const fn new(store: Arc<S>, origin: Origin, page_size: u64) -> Self {
        Self {
            store,
            origin,
            page_size,
        }
    }

    /// Classify a collection IRI into owner and kind.
    ///
    /// A foreign IRI fails with `NotOurs`; a local IRI that is not an
    /// actor sub-path fails with `InvalidCollection`.
    pub fn classify(&self, iri: &Url) -> AppResult<CollectionRef> {
        if !self.origin.is_local(iri) {
            return Err(AppError::NotOurs(iri.to_string()));
        }
        match LocalRef::parse(iri) {
            Some(LocalRef::SubCollection { nick, name }) => Ok(CollectionRef {
                owner_iri: self.origin.actor_iri(&nick),
                nick,
                kind: CollectionKind::from_segment(&name),
                iri: iri.clone(),
            }),
            _ => Err(AppError::InvalidCollection(iri.to_string())),
        }
    }

    /// Whether `member` is in the collection.
    ///
    /// Follow collections require edge state `accepted`; pending and
    /// rejected edges are not members.
    pub async fn contains(&self, collection_iri: &Url, member: &Url) -> AppResult<bool> {
        let collection = self.classify(collection_iri)?;
        let owner = collection.owner_iri.as_str();
        let member = member.as_str();

        match &collection.kind {
            CollectionKind::Inbox => {
                self.store.mailbox_contains(owner, Direction::In, member).await
            }
            CollectionKind::Outbox => {
                self.store.mailbox_contains(owner, Direction::Out, member).await
            }
            CollectionKind::Liked => self.store.likes_contains(owner, member).await,
            CollectionKind::Following => Ok(self.store.follow_state(owner, member).await?
                == Some(FollowState::Accepted)),
            CollectionKind::Followers => Ok(self.store.follow_state(member, owner).await?
                == Some(FollowState::Accepted)),
            CollectionKind::Named(name) => {
                self.store.collection_contains(owner, name, member).await
            }
        }
    }

    /// A count-and-first-link summary; the item set is never
    /// materialized.
    pub async fn get_summary(&self, collection_iri: &Url) -> AppResult<OrderedCollection> {
        let collection = self.classify(collection_iri)?;
        let owner = collection.owner_iri.as_str();

        let total_items = match &collection.kind {
            CollectionKind::Inbox => self.store.mailbox_count(owner, Direction::In).await?,
            CollectionKind::Outbox => self.store.mailbox_count(owner, Direction::Out).await?,
            CollectionKind::Liked => self.store.likes_count(owner).await?,
            CollectionKind::Following => self.store.following_count(owner).await?,
            CollectionKind::Followers => self.store.followers_count(owner).await?,
            CollectionKind::Named(name) => self.store.collection_count(owner, name).await?,
        };

        let mut first = collection.iri.clone();
        first.set_query(Some("page=true"));

        Ok(OrderedCollection {
            context: activitystreams_context(),
            kind: "OrderedCollection".to_string(),
            id: collection.iri,
            total_items,
            first: Some(first),
        })
    }

    /// One id-bounded page, newest first, with a `next` link pointing at
    /// the strictly-older window.
    pub async fn get_page(
        &self,
        collection_iri: &Url,
        cursor: &Cursor,
    ) -> AppResult<OrderedCollectionPage> {
        let collection = self.classify(collection_iri)?;
        let owner = collection.owner_iri.as_str();
        let query = RangeQuery {
            min_id: cursor.min_id.clone(),
            max_id: cursor.max_id.clone(),
            limit: cursor.page_size.unwrap_or(self.page_size),
        };

        // (item JSON, commit id) pairs, newest first.
        let items: Vec<(Json, String)> = match &collection.kind {
            CollectionKind::Inbox | CollectionKind::Outbox => {
                let direction = if collection.kind == CollectionKind::Inbox {
                    Direction::In
                } else {
                    Direction::Out
                };
                let entries = self.store.mailbox_page(owner, direction, &query).await?;
                let mut items = Vec::with_capacity(entries.len());
                for entry in entries {
                    let item = match self.store.object_by_iri(&entry.activity_iri).await? {
                        Some(record) => record.data,
                        None => Json::String(entry.activity_iri.clone()),
                    };
                    items.push((item, entry.id));
                }
                items
            }
            CollectionKind::Liked => self
                .store
                .likes_page(owner, &query)
                .await?
                .into_iter()
                .map(|like| (Json::String(like.object_iri), like.id))
                .collect(),
            CollectionKind::Following => self
                .store
                .following_page(owner, &query)
                .await?
                .into_iter()
                .map(|edge| (Json::String(edge.followee_iri), edge.id))
                .collect(),
            CollectionKind::Followers => self
                .store
                .followers_page(owner, &query)
                .await?
                .into_iter()
                .map(|edge| (Json::String(edge.follower_iri), edge.id))
                .collect(),
            CollectionKind::Named(name) => self
                .store
                .collection_page(owner, name, &query)
                .await?
                .into_iter()
                .map(|item| (Json::String(item.object_iri), item.id))
                .collect(),
        };

        let mut page_iri = collection.iri.clone();
        match &cursor.max_id {
            Some(max_id) => page_iri.set_query(Some(&format!("max_id={max_id}&page=true"))),
            None => page_iri.set_query(Some("page=true")),
        }

        // The oldest returned id keys the next window; concurrent
        // inserts land above it and cannot shift this walk.
        let next = items.last().map(|(_, oldest_id)| {
            let mut next_iri = collection.iri.clone();
            next_iri.set_query(Some(&format!("max_id={oldest_id}&page=true")));
            next_iri
        });

        Ok(OrderedCollectionPage {
            context: activitystreams_context(),
            kind: "OrderedCollectionPage".to_string(),
            id: page_iri,
            part_of: collection.iri,
            next,
            ordered_items: items.into_iter().map(|(item, _)| item).collect(),
        })
    }

    /// Append items to a collection, dispatching per item on the
    /// collection kind.
    ///
    /// Best-effort, not atomic: items apply in order and the first
    /// failure aborts the rest, leaving earlier items committed.
    pub async fn append(&self, collection_iri: &Url, items: &[Json]) -> AppResult<()> {
        let collection = self.classify(collection_iri)?;
        for item in items {
            self.append_one(&collection, item).await?;
        }
        Ok(())
    }

    async fn append_one(&self, collection: &CollectionRef, item: &Json) -> AppResult<()> {
        let owner = collection.owner_iri.as_str();
        let item_iri = item_iri(item)?;

        match &collection.kind {
            CollectionKind::Inbox | CollectionKind::Outbox => {
                let direction = if collection.kind == CollectionKind::Inbox {
                    Direction::In
                } else {
                    Direction::Out
                };
                // Mailboxes link already-persisted activities.
                let record = self
                    .store
                    .object_by_iri(item_iri.as_str())
                    .await?
                    .ok_or_else(|| AppError::NotFound(item_iri.to_string()))?;
                let visibility = compute_visibility(&record.data, owner);
                self.store
                    .link_mailbox(owner, item_iri.as_str(), direction, visibility)
                    .await?;
            }
            CollectionKind::Liked => {
                self.store.upsert_like(owner, item_iri.as_str()).await?;
            }
            CollectionKind::Following => {
                self.store
                    .upsert_follow(owner, item_iri.as_str(), FollowState::Accepted)
                    .await?;
            }
            CollectionKind::Followers => {
                self.store
                    .upsert_follow(item_iri.as_str(), owner, FollowState::Accepted)
                    .await?;
            }
            CollectionKind::Named(name) => {
                // Object type is a best-effort placeholder; members are
                // never dereferenced here.
                let object_type = item_type(item).unwrap_or("Object");
                self.store
                    .insert_collection_item(owner, name, item_iri.as_str(), object_type)
                    .await?;
            }
        }

        debug!(collection = %collection.iri, item = %item_iri, "Appended collection item");
        Ok(())
    }

    /// Record a follow edge in a caller-specified state (e.g. `pending`
    /// until the remote side accepts).
    pub async fn append_follow(
        &self,
        collection_iri: &Url,
        peer: &Url,
        state: FollowState,
    ) -> AppResult<()> {
        let collection = self.classify(collection_iri)?;
        let owner = collection.owner_iri.as_str();
        match &collection.kind {
            CollectionKind::Following => {
                self.store.upsert_follow(owner, peer.as_str(), state).await?;
                Ok(())
            }
            CollectionKind::Followers => {
                self.store.upsert_follow(peer.as_str(), owner, state).await?;
                Ok(())
            }
            _ => Err(AppError::InvalidCollection(format!(
                "{} does not hold follow edges",
                collection.iri
            ))),
        }
    }

    /// Remove items from a named collection.
    ///
    /// Zero matches is `NotFound`; removing only some of the requested
    /// items is logged and tolerated.
    pub async fn remove(&self, collection_iri: &Url, items: &[Json]) -> AppResult<()> {
        let collection = self.classify(collection_iri)?;
        let CollectionKind::Named(name) = &collection.kind else {
            return Err(AppError::InvalidCollection(format!(
                "cannot remove from built-in collection {}",
                collection.iri
            )));
        };
        let owner = collection.owner_iri.as_str();

        let mut removed = 0usize;
        for item in items {
            let item_iri = item_iri(item)?;
            if self
                .store
                .remove_collection_item(owner, name, item_iri.as_str())
                .await?
            {
                removed += 1;
            }
        }

        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "no requested item found in {}",
                collection.iri
            )));
        }
        if removed < items.len() {
            warn!(
                collection = %collection.iri,
                requested = items.len(),
                removed,
                "Partial removal from collection"
            );
        }
        Ok(())
    }
}

/// The IRI an append/remove item refers to: a bare string, or the `id`
/// of an inline object.
fn item_iri(item: &Json) -> AppResult<Url> {
    let raw = match item {
        Json::String(iri) => iri.as_str(),
        Json::Object(map) => map
            .get("id")
            .and_then(Json::as_str)
            .ok_or(AppError::IdRequired)?,
        _ => return Err(AppError::IdRequired),
    };
    Url::parse(raw).map_err(|_| AppError::BadRequest(format!("not an IRI: {raw}")))
}

/// Best-effort type name of an inline item.
fn item_type(item: &Json) -> Option<&str> {
    match item.get("type")? {
        Json::String(name) => Some(name),
        Json::Array(values) => values.first().and_then(Json::as_str),
        _ => None,
    }
}

/// Visibility from the activity's addressing.
///
/// `to` public → public; `cc` public → unlisted; the owner's followers
/// collection anywhere → followers; otherwise direct.
fn compute_visibility(activity: &Json, owner_iri: &str) -> Visibility {
    let followers_iri = format!("{owner_iri}/followers");
    let lists = |key: &str| -> Vec<&str> {
        match activity.get(key) {
            Some(Json::String(iri)) => vec![iri.as_str()],
            Some(Json::Array(values)) => values.iter().filter_map(Json::as_str).collect(),
            _ => Vec::new(),
        }
    };
    let to = lists("to");
    let cc = lists("cc");

    let is_public = |iri: &&str| *iri == PUBLIC_IRI || *iri == "as:Public" || *iri == "Public";
    if to.iter().any(is_public) {
        Visibility::Public
    } else if cc.iter().any(is_public) {
        Visibility::Unlisted
    } else if to.iter().chain(cc.iter()).any(|iri| *iri == followers_iri) {
        Visibility::Followers
    } else {
        Visibility::Direct
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_segment() {
        assert_eq!(CollectionKind::from_segment("inbox"), CollectionKind::Inbox);
        assert_eq!(CollectionKind::from_segment("liked"), CollectionKind::Liked);
        assert_eq!(
            CollectionKind::from_segment("pinned"),
            CollectionKind::Named("pinned".to_string())
        );
    }

    #[test]
    fn test_item_iri_accepts_strings_and_objects() {
        assert_eq!(
            item_iri(&json!("https://b.example/notes/1")).unwrap().as_str(),
            "https://b.example/notes/1"
        );
        assert_eq!(
            item_iri(&json!({"id": "https://b.example/notes/1", "type": "Note"}))
                .unwrap()
                .as_str(),
            "https://b.example/notes/1"
        );
        assert!(matches!(item_iri(&json!({})), Err(AppError::IdRequired)));
        assert!(matches!(item_iri(&json!(42)), Err(AppError::IdRequired)));
    }

    #[test]
    fn test_visibility_from_addressing() {
        let owner = "https://a.example/users/alice";
        let followers = "https://a.example/users/alice/followers";

        let public = json!({"to": [PUBLIC_IRI], "cc": [followers]});
        assert_eq!(compute_visibility(&public, owner), Visibility::Public);

        let unlisted = json!({"to": [followers], "cc": [PUBLIC_IRI]});
        assert_eq!(compute_visibility(&unlisted, owner), Visibility::Unlisted);

        let followers_only = json!({"to": [followers]});
        assert_eq!(compute_visibility(&followers_only, owner), Visibility::Followers);

        let direct = json!({"to": ["https://b.example/users/bob"]});
        assert_eq!(compute_visibility(&direct, owner), Visibility::Direct);
    }
}
