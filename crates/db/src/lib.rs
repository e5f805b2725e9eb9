//! Persistence interface for fediwire.
//!
//! The federation layer consumes storage through the repository traits
//! in this crate: CRUD by opaque id and by canonical IRI, plus ordered
//! range queries over commit-time ids. Ids are ULIDs assigned at commit
//! time — monotonically increasing, lexically sortable, never reused —
//! which is what keeps `max_id`-bounded pages stable under concurrent
//! writes.
//!
//! [`MemoryStore`] implements every trait in process memory; tests and
//! storeless embedders use it directly, servers bring their own backend.

pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryStore;
pub use models::{
    ActorKeypair, CollectionItem, Direction, FollowEdge, FollowState, LikeRecord, MailboxEntry,
    ObjectRecord, Visibility,
};
pub use store::{
    CollectionItemRepository, FollowRepository, KeypairRepository, LikeRepository,
    MailboxRepository, ObjectRepository, RangeQuery, Store,
};
