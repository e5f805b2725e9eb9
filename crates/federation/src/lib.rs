//! `ActivityPub` federation layer for fediwire.
//!
//! Builds the server-side protocol semantics on top of the
//! `fediwire-vocab` codec and the `fediwire-db` persistence interface:
//!
//! - **IRI classification**: local path patterns, locality checks, id
//!   assignment ([`Origin`], [`LocalRef`])
//! - **Collections**: inbox/outbox/liked/following/followers/named
//!   semantics with cursor-stable pagination ([`CollectionEngine`])
//! - **Objects**: generic lookup and create/update/delete with
//!   side-effect-free re-serialization ([`ObjectService`])
//! - **Security**: HTTP Signatures, inbound verification with a
//!   TTL-bounded key cache ([`HttpSigner`], [`InboundVerifier`])
//! - **Delivery**: signed per-actor transports with bounded batch
//!   fan-out and partial-failure reporting ([`Transport`])

pub mod cache;
pub mod collections;
pub mod inbox;
pub mod iri;
pub mod objects;
pub mod signature;
pub mod transport;
pub mod webfinger;

pub use cache::{CachedKey, KeyCache};
pub use collections::{
    CollectionEngine, CollectionKind, CollectionRef, Cursor, OrderedCollection,
    OrderedCollectionPage,
};
pub use inbox::InboundVerifier;
pub use iri::{LocalRef, Origin, new_object_id};
pub use objects::ObjectService;
pub use signature::{HttpSigner, HttpVerifier, SignatureComponents, SignatureError};
pub use transport::{Transport, ensure_keypair};
pub use webfinger::WebfingerClient;

use fediwire_common::AppError;
use fediwire_vocab::VocabError;

/// Lift a codec error into the federation taxonomy.
#[must_use]
pub fn vocab_error(err: VocabError) -> AppError {
    match err {
        VocabError::UnhandledType(name) => AppError::UnhandledType(name),
        VocabError::TypeRequired => AppError::TypeRequired,
        VocabError::Property { property, reason } => {
            AppError::BadRequest(format!("invalid property {property}: {reason}"))
        }
    }
}
