//! `ActivityStreams` 2.0 JSON-LD codec for fediwire.
//!
//! This crate implements the vocabulary layer of the federation protocol:
//!
//! - **Context resolution**: JSON-LD `@context` values become a
//!   vocabulary-to-alias map ([`VocabularyContext`])
//! - **Schema tables**: one declarative table of types and properties per
//!   namespace drives a single generic codec ([`schema`])
//! - **Property codec**: polymorphic per-property decoding with ordered
//!   kind precedence and a verbatim `unknown` fallback
//! - **Typed objects**: whole-document decode/encode with namespace
//!   priority dispatch and lossless round-trips ([`TypedObject`])
//!
//! Decoding is tolerant by policy: an unrecognized property *shape* never
//! fails the object (it is preserved verbatim), while an unmatched `type`
//! or a malformed language map does.
//!
//! # Example
//!
//! ```
//! use fediwire_vocab::TypedObject;
//! use serde_json::json;
//!
//! let note = TypedObject::decode(&json!({
//!     "@context": "https://www.w3.org/ns/activitystreams",
//!     "type": "Note",
//!     "content": "hi",
//! })).unwrap();
//!
//! assert_eq!(note.type_name, "Note");
//! assert_eq!(note.encode()["content"], json!("hi"));
//! ```

pub mod context;
pub mod object;
pub mod property;
pub mod schema;
pub mod value;

pub use context::VocabularyContext;
pub use object::TypedObject;
pub use property::{PropertyValue, Value};
pub use schema::{Kind, Namespace, PropertySpec, Schema, TypeSpec, schema};
pub use value::Literal;

use thiserror::Error;

/// Errors produced while decoding a JSON-LD document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabError {
    /// The document's `type` matched no known namespace table.
    #[error("unhandled type: {0}")]
    UnhandledType(String),

    /// The document carries no `type` key (or is not a JSON object).
    #[error("object has no type")]
    TypeRequired,

    /// A property resolver hit a malformed value it cannot tolerate.
    #[error("invalid value for property {property}: {reason}")]
    Property {
        /// The property whose resolver rejected the value.
        property: String,
        /// Human-readable rejection reason.
        reason: String,
    },
}

impl VocabError {
    pub(crate) fn property(property: &str, reason: impl Into<String>) -> Self {
        Self::Property {
            property: property.to_string(),
            reason: reason.into(),
        }
    }
}
